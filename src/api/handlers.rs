use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::form::NarrationForm;
use super::{
    HealthResponse, HistoryResponse, NarrationSummary, OptionsResponse, ServiceStatus, ToneInfo,
    VoiceInfo,
};
use crate::api::routes::AppState;
use crate::error::AppError;
use crate::narration::{SessionHistory, Tone, Voice};

pub async fn create_narration(
    State(state): State<Arc<AppState>>,
    history: SessionHistory,
    multipart: Multipart,
) -> Result<(StatusCode, Json<NarrationSummary>), AppError> {
    let request = NarrationForm::read(multipart).await?.into_request()?;

    // History is only touched once both upstream calls have succeeded.
    let record = state.narrator.generate(request).await?;
    let summary = NarrationSummary::from(&record);
    history.append(record).await?;

    tracing::info!(
        id = %summary.id,
        tone = %summary.tone,
        voice = summary.voice.id(),
        audio_bytes = summary.audio_bytes,
        "Narration generated"
    );

    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn list_narrations(history: SessionHistory) -> Result<Json<HistoryResponse>, AppError> {
    let narrations = history
        .records()
        .await?
        .iter()
        .map(NarrationSummary::from)
        .collect();
    Ok(Json(HistoryResponse { narrations }))
}

pub async fn narration_audio(
    history: SessionHistory,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    audio_response(&history, id, "inline".to_string()).await
}

pub async fn download_narration(
    history: SessionHistory,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let disposition = format!("attachment; filename=\"{}.mp3\"", id);
    audio_response(&history, id, disposition).await
}

async fn audio_response(
    history: &SessionHistory,
    id: Uuid,
    disposition: String,
) -> Result<Response, AppError> {
    let record = history
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(id.to_string()))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        record.audio,
    )
        .into_response())
}

pub async fn list_options(State(state): State<Arc<AppState>>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        tones: Tone::ALL
            .into_iter()
            .map(|tone| ToneInfo {
                name: tone.name(),
                description: tone.description(),
            })
            .collect(),
        voices: Voice::ALL
            .into_iter()
            .map(|voice| VoiceInfo {
                id: voice.id(),
                name: voice.name(),
                label: voice.label(),
            })
            .collect(),
        max_text_length: state.narrator.max_text_length(),
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let rewriter = state.narrator.rewriter();
    let synthesizer = state.narrator.synthesizer();
    let ready = rewriter.is_configured() && synthesizer.is_configured();

    Json(HealthResponse {
        status: if ready { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rewriter: ServiceStatus {
            name: rewriter.name(),
            configured: rewriter.is_configured(),
        },
        synthesizer: ServiceStatus {
            name: synthesizer.name(),
            configured: synthesizer.is_configured(),
        },
    })
}
