use std::sync::Arc;

use crate::generation::generator::RetryPolicy;
use crate::job_scraper::JobScraper;
use crate::llm_client::ChatModel;
use crate::mailer::MailTransport;
use crate::portfolio::embedder::Embedder;
use crate::portfolio::index::IndexStore;
use crate::session::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Hosted chat model. `LlmClient` in production.
    pub llm: Arc<dyn ChatModel>,
    pub retry: RetryPolicy,
    pub embedder: Arc<dyn Embedder>,
    pub index_store: IndexStore,
    pub scraper: JobScraper,
    /// Mail relay. `SmtpMailer` in production.
    pub mailer: Arc<dyn MailTransport>,
}
