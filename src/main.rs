use std::sync::Arc;
use std::time::Duration;

use tower_sessions::ExpiredDeletion;
use tracing_subscriber::EnvFilter;

use echoverse::narration::{NarrationService, NarrationStore};
use echoverse::providers::{GraniteRewriter, Rewriter, Synthesizer, WatsonSynthesizer};
use echoverse::{create_router, AppState, Config};

const SESSION_PURGE_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let addr = config.addr()?;

    tracing::info!("EchoVerse v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Starting server on http://{}", addr);
    tracing::info!("Rewrite model: {}", config.granite.model);

    let rewriter = GraniteRewriter::new(config.granite.clone());
    let synthesizer = WatsonSynthesizer::new(config.watson.clone());
    if !rewriter.is_configured() {
        tracing::warn!("HF_API_TOKEN is not set, narration requests will fail");
    }
    if !synthesizer.is_configured() {
        tracing::warn!("IBM_API_KEY or IBM_TTS_URL is not set, narration requests will fail");
    }

    let session_store = NarrationStore::default();
    let purge = session_store
        .clone()
        .continuously_delete_expired(Duration::from_secs(SESSION_PURGE_INTERVAL_SECS));
    tokio::spawn(async move {
        if let Err(e) = purge.await {
            tracing::error!("Session purge task stopped: {}", e);
        }
    });

    let state = Arc::new(AppState {
        narrator: NarrationService::new(
            Arc::new(rewriter),
            Arc::new(synthesizer),
            config.max_text_length,
        ),
        max_upload_bytes: config.max_upload_bytes,
        session_key: config.session_key()?,
        session_store,
        static_dir: config.static_dir.clone(),
    });

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
