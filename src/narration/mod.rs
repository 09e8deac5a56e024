pub mod history;
pub mod options;
pub mod prompt;
pub mod store;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::providers::{Rewriter, Synthesizer};

pub use history::SessionHistory;
pub use options::{Tone, Voice};
pub use store::NarrationStore;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub text: String,
    pub tone: Tone,
    pub voice: Voice,
}

/// One finished narration as kept in the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub original_text: String,
    pub rewritten_text: String,
    pub tone: Tone,
    pub voice: Voice,
    #[serde(with = "base64_audio")]
    pub audio: Vec<u8>,
    pub created_at: DateTime<Utc>,
}

pub struct NarrationService {
    rewriter: Arc<dyn Rewriter>,
    synthesizer: Arc<dyn Synthesizer>,
    max_text_length: usize,
}

impl NarrationService {
    pub fn new(
        rewriter: Arc<dyn Rewriter>,
        synthesizer: Arc<dyn Synthesizer>,
        max_text_length: usize,
    ) -> Self {
        Self {
            rewriter,
            synthesizer,
            max_text_length,
        }
    }

    pub fn max_text_length(&self) -> usize {
        self.max_text_length
    }

    pub fn rewriter(&self) -> &dyn Rewriter {
        self.rewriter.as_ref()
    }

    pub fn synthesizer(&self) -> &dyn Synthesizer {
        self.synthesizer.as_ref()
    }

    pub fn validate(&self, text: &str) -> Result<(), AppError> {
        if text.trim().is_empty() {
            return Err(AppError::validation(
                "Please provide text or upload a .txt file",
            ));
        }

        let length = text.chars().count();
        if length > self.max_text_length {
            return Err(AppError::validation(format!(
                "Text too long ({} chars, max {})",
                length, self.max_text_length
            )));
        }

        if !prompt::is_plain_text(text) {
            return Err(AppError::validation("Text must be plain UTF-8 text"));
        }

        Ok(())
    }

    /// Rewrite and voice the request. Nothing is recorded here; the caller
    /// appends the returned record to the session history.
    pub async fn generate(&self, request: GenerationRequest) -> Result<GenerationRecord, AppError> {
        self.validate(&request.text)?;

        tracing::info!(
            rewriter = self.rewriter.name(),
            tone = %request.tone,
            chars = request.text.chars().count(),
            "Rewriting text"
        );
        let rewritten = self.rewriter.rewrite(&request.text, request.tone).await?;
        if rewritten.trim().is_empty() {
            return Err(AppError::upstream(
                self.rewriter.name(),
                "returned an empty rewrite",
            ));
        }

        tracing::info!(
            synthesizer = self.synthesizer.name(),
            voice = request.voice.id(),
            "Synthesizing audio"
        );
        let audio = self.synthesizer.synthesize(&rewritten, request.voice).await?;
        if audio.is_empty() {
            return Err(AppError::upstream(
                self.synthesizer.name(),
                "returned no audio",
            ));
        }

        Ok(GenerationRecord {
            id: Uuid::new_v4(),
            original_text: request.text,
            rewritten_text: rewritten,
            tone: request.tone,
            voice: request.voice,
            audio,
            created_at: Utc::now(),
        })
    }
}

mod base64_audio {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct EchoRewriter {
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Rewriter for EchoRewriter {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn rewrite(&self, text: &str, tone: Tone) -> Result<String, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{}] {}", tone, text))
        }
    }

    pub struct FixedSynthesizer {
        pub audio: Result<Vec<u8>, &'static str>,
    }

    #[async_trait]
    impl Synthesizer for FixedSynthesizer {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn synthesize(&self, _text: &str, _voice: Voice) -> Result<Vec<u8>, AppError> {
            self.audio
                .clone()
                .map_err(|msg| AppError::upstream("fixed", msg))
        }
    }

    fn service(audio: Result<Vec<u8>, &'static str>) -> (NarrationService, Arc<EchoRewriter>) {
        let rewriter = Arc::new(EchoRewriter {
            calls: AtomicUsize::new(0),
        });
        let service = NarrationService::new(
            rewriter.clone(),
            Arc::new(FixedSynthesizer { audio }),
            20,
        );
        (service, rewriter)
    }

    fn request(text: &str) -> GenerationRequest {
        GenerationRequest {
            text: text.to_string(),
            tone: Tone::Inspiring,
            voice: Voice::Kate,
        }
    }

    #[tokio::test]
    async fn empty_text_never_reaches_upstream() {
        let (service, rewriter) = service(Ok(vec![1]));
        for text in ["", "   ", "\n\t"] {
            let err = service.generate(request(text)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overlong_text_is_rejected() {
        let (service, rewriter) = service(Ok(vec![1]));
        let err = service.generate(request(&"a".repeat(21))).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn length_bound_counts_characters_not_bytes() {
        let (service, _) = service(Ok(vec![1]));
        assert!(service.validate(&"é".repeat(20)).is_ok());
        assert!(service.validate(&"é".repeat(21)).is_err());
    }

    #[test]
    fn control_characters_are_rejected() {
        let (service, _) = service(Ok(vec![1]));
        assert!(service.validate("bad\u{7}bell").is_err());
    }

    #[tokio::test]
    async fn successful_generation_builds_record() {
        let (service, rewriter) = service(Ok(vec![0xFF, 0xFB, 0x90]));
        let record = service.generate(request("Keep going.")).await.unwrap();

        assert_eq!(record.original_text, "Keep going.");
        assert_eq!(record.rewritten_text, "[Inspiring] Keep going.");
        assert_eq!(record.voice, Voice::Kate);
        assert_eq!(record.tone, Tone::Inspiring);
        assert_eq!(record.audio, vec![0xFF, 0xFB, 0x90]);
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn synthesis_failure_surfaces_upstream_error() {
        let (service, _) = service(Err("HTTP 500"));
        let err = service.generate(request("Hello")).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn empty_audio_is_an_upstream_error() {
        let (service, _) = service(Ok(Vec::new()));
        let err = service.generate(request("Hello")).await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable { service: "fixed", .. }));
    }

    #[test]
    fn record_audio_serializes_as_base64() {
        let record = GenerationRecord {
            id: Uuid::nil(),
            original_text: "a".into(),
            rewritten_text: "b".into(),
            tone: Tone::Neutral,
            voice: Voice::Allison,
            audio: b"ID3".to_vec(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["audio"], "SUQz");
        let back: GenerationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.audio, b"ID3");
    }
}
