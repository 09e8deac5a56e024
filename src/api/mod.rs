pub mod form;
pub mod handlers;
pub mod routes;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::narration::{GenerationRecord, Tone, Voice};

#[derive(Debug, Serialize)]
pub struct NarrationSummary {
    pub id: Uuid,
    pub original_text: String,
    pub rewritten_text: String,
    pub tone: Tone,
    pub voice: Voice,
    pub voice_label: &'static str,
    pub audio_bytes: usize,
    pub audio_url: String,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
}

impl From<&GenerationRecord> for NarrationSummary {
    fn from(record: &GenerationRecord) -> Self {
        Self {
            id: record.id,
            original_text: record.original_text.clone(),
            rewritten_text: record.rewritten_text.clone(),
            tone: record.tone,
            voice: record.voice,
            voice_label: record.voice.label(),
            audio_bytes: record.audio.len(),
            audio_url: format!("/api/narrations/{}/audio", record.id),
            download_url: format!("/api/narrations/{}/download", record.id),
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub narrations: Vec<NarrationSummary>,
}

#[derive(Debug, Serialize)]
pub struct ToneInfo {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VoiceInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub tones: Vec<ToneInfo>,
    pub voices: Vec<VoiceInfo>,
    pub max_text_length: usize,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub name: &'static str,
    pub configured: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub rewriter: ServiceStatus,
    pub synthesizer: ServiceStatus,
}
