//! Tone rewriting through the Hugging Face inference API, backed by an IBM Granite model.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{classify_status, transport_error, Rewriter};
use crate::config::GraniteConfig;
use crate::error::AppError;
use crate::narration::{prompt, Tone};

const SERVICE: &str = "Granite rewriter";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct GraniteRewriter {
    config: GraniteConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    return_full_text: bool,
}

/// Text generation models answer with a list, summarisation-style models with an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<GeneratedText>),
    Single(GeneratedText),
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: Option<String>,
    summary_text: Option<String>,
}

impl GraniteRewriter {
    pub fn new(config: GraniteConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Rewriter for GraniteRewriter {
    fn name(&self) -> &'static str {
        SERVICE
    }

    fn is_configured(&self) -> bool {
        self.config.api_token.is_some()
    }

    #[tracing::instrument(skip(self, text), fields(model = %self.config.model))]
    async fn rewrite(&self, text: &str, tone: Tone) -> Result<String, AppError> {
        let token = self
            .config
            .api_token
            .as_ref()
            .ok_or_else(|| AppError::credentials(SERVICE, "HF_API_TOKEN is not configured"))?;

        let prompt = prompt::build(text, tone);
        let request = InferenceRequest {
            inputs: &prompt,
            parameters: InferenceParameters {
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(token.expose_secret())
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(SERVICE, status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::upstream(SERVICE, format!("invalid JSON response: {}", e)))?;

        let generated = extract_text(body)?;
        let rewritten = prompt::clean_output(&prompt, &generated);
        if rewritten.is_empty() {
            return Err(AppError::upstream(SERVICE, "returned an empty rewrite"));
        }

        tracing::debug!(chars = rewritten.chars().count(), "Rewrite complete");
        Ok(rewritten)
    }
}

fn extract_text(body: Value) -> Result<String, AppError> {
    let raw = body.to_string();
    let parsed: Option<GeneratedText> = match serde_json::from_value(body) {
        Ok(InferenceResponse::Batch(items)) => items.into_iter().next(),
        Ok(InferenceResponse::Single(item)) => Some(item),
        Err(_) => None,
    };

    parsed
        .and_then(|item| item.generated_text.or(item.summary_text))
        .ok_or_else(|| {
            let shown: String = raw.chars().take(200).collect();
            AppError::upstream(SERVICE, format!("unexpected response format: {}", shown))
        })
}
