pub mod granite;
pub mod watson;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::AppError;
use crate::narration::{Tone, Voice};

pub use granite::GraniteRewriter;
pub use watson::WatsonSynthesizer;

/// Rewrites text in a requested tone.
#[async_trait]
pub trait Rewriter: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    async fn rewrite(&self, text: &str, tone: Tone) -> Result<String, AppError>;
}

/// Turns text into MP3 audio.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_configured(&self) -> bool;

    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>, AppError>;
}

/// Map a failed upstream response onto the error the caller sees.
pub fn classify_status(service: &'static str, status: StatusCode, body: &str) -> AppError {
    let message = format!("HTTP {} {}", status.as_u16(), snippet(body));
    match status {
        StatusCode::UNAUTHORIZED
        | StatusCode::PAYMENT_REQUIRED
        | StatusCode::FORBIDDEN
        | StatusCode::TOO_MANY_REQUESTS => AppError::credentials(service, message),
        _ => AppError::upstream(service, message),
    }
}

/// Transport level failures (DNS, connect, timeout) all mean the service is unreachable.
pub fn transport_error(service: &'static str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::upstream(service, "request timed out")
    } else {
        AppError::upstream(service, err.to_string())
    }
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(200).collect()
}
