mod config;
mod errors;
mod generation;
mod job_scraper;
mod llm_client;
mod mailer;
mod models;
mod portfolio;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::generation::generator::RetryPolicy;
use crate::job_scraper::JobScraper;
use crate::llm_client::LlmClient;
use crate::mailer::SmtpMailer;
use crate::portfolio::embedder;
use crate::portfolio::index::IndexStore;
use crate::routes::build_router;
use crate::session::{remove_orphaned_indexes, SessionStore};
use crate::state::AppState;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cold Email Generator v{}", env!("CARGO_PKG_VERSION"));

    let llm = LlmClient::new(config.groq_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Model loading is blocking and may download weights on first start
    let backend = config.embedding_backend;
    let embedder = tokio::task::spawn_blocking(move || embedder::init(backend)).await??;
    info!("Embedder ready: {}", embedder.model_name());

    let index_store = IndexStore::new(config.index_dir.clone());
    info!("Index directory: {}", index_store.root().display());

    let mailer = SmtpMailer::new(config.smtp_host.clone(), config.smtp_port);
    info!("SMTP relay: {}:{}", config.smtp_host, config.smtp_port);

    let state = AppState {
        sessions: SessionStore::new(),
        llm: Arc::new(llm),
        retry: RetryPolicy::default(),
        embedder: Arc::from(embedder),
        index_store,
        scraper: JobScraper::new()?,
        mailer: Arc::new(mailer),
    };

    // Indexes are scoped to in-memory sessions, so anything on disk at startup is stale
    remove_orphaned_indexes(&state.sessions, &state.index_store).await?;

    spawn_session_sweeper(
        state.sessions.clone(),
        state.index_store.clone(),
        chrono::Duration::minutes(config.session_ttl_minutes),
    );

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drops idle sessions, then any persisted index without a live session.
fn spawn_session_sweeper(sessions: SessionStore, store: IndexStore, ttl: chrono::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let expired = sessions.purge_idle(ttl).await;
            if !expired.is_empty() {
                info!("Purged {} idle sessions", expired.len());
            }

            if let Err(e) = remove_orphaned_indexes(&sessions, &store).await {
                warn!("Index cleanup failed: {e:#}");
            }
        }
    });
}
