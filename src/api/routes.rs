use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tower_sessions::{cookie::Key, Expiry, SessionManagerLayer};

use super::handlers;
use crate::narration::{NarrationService, NarrationStore};

pub struct AppState {
    pub narrator: NarrationService,
    pub max_upload_bytes: usize,
    pub session_key: Key,
    pub session_store: NarrationStore,
    pub static_dir: PathBuf,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let sessions = SessionManagerLayer::new(state.session_store.clone())
        .with_secure(false)
        .with_expiry(Expiry::OnInactivity(Duration::hours(24)))
        .with_signed(state.session_key.clone());

    let api_routes = Router::new()
        .route(
            "/narrations",
            get(handlers::list_narrations).post(handlers::create_narration),
        )
        .route("/narrations/:id/audio", get(handlers::narration_audio))
        .route("/narrations/:id/download", get(handlers::download_narration))
        .route("/options", get(handlers::list_options))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    let static_files =
        ServeDir::new(&state.static_dir).append_index_html_on_directories(true);

    Router::new()
        .nest("/api", api_routes)
        .fallback_service(static_files)
        .layer(sessions)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
