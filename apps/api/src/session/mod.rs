//! Session State — one slot per session for the last generated email, plus the
//! inputs gathered so far (job description, portfolio index).
//!
//! Sessions are plain values. Handlers take a snapshot, run their step without
//! holding the store lock, and write the next value back.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::mailer::DEFAULT_SUBJECT;
use crate::models::portfolio::PortfolioRow;
use crate::portfolio::index::{IndexStore, PortfolioIndex};

pub const ONBOARDING_MESSAGE: &str =
    "Upload your portfolio CSV and fill in details in the sidebar to get started.";

/// Where a session sits in the Idle → Indexed → Generated progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Indexed,
    Generated,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub job_url: String,
    /// Empty when no URL was given or scraping failed.
    pub job_description: String,
    pub portfolio: Option<Arc<PortfolioIndex>>,
    /// Last successful generation; empty until one succeeds.
    pub generated_email: String,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            job_url: String::new(),
            job_description: String::new(),
            portfolio: None,
            generated_email: String::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        if !self.generated_email.is_empty() {
            Stage::Generated
        } else if self.portfolio.is_some() {
            Stage::Indexed
        } else {
            Stage::Idle
        }
    }

    /// Records a scrape result. `description` is empty when scraping failed.
    pub fn with_job(self, job_url: String, job_description: String) -> Self {
        Self {
            job_url,
            job_description,
            updated_at: Utc::now(),
            ..self
        }
    }

    /// Replaces any previous index.
    pub fn with_portfolio(self, index: PortfolioIndex) -> Self {
        Self {
            portfolio: Some(Arc::new(index)),
            updated_at: Utc::now(),
            ..self
        }
    }

    /// Applies a generation result. A failed run (`None`) keeps the last success.
    pub fn with_generation(self, email: Option<String>) -> Self {
        match email {
            Some(email) => Self {
                generated_email: email,
                updated_at: Utc::now(),
                ..self
            },
            None => Self {
                updated_at: Utc::now(),
                ..self
            },
        }
    }

    pub fn touch(self) -> Self {
        Self {
            updated_at: Utc::now(),
            ..self
        }
    }

    pub fn view(&self) -> SessionView {
        let has_email = !self.generated_email.is_empty();
        SessionView {
            session_id: self.id,
            created_at: self.created_at,
            stage: self.stage(),
            job_url: self.job_url.clone(),
            job_description: self.job_description.clone(),
            portfolio_rows: self
                .portfolio
                .as_ref()
                .map(|p| p.rows.clone())
                .unwrap_or_default(),
            chunk_count: self.portfolio.as_ref().map(|p| p.len()).unwrap_or(0),
            generated_email: has_email.then(|| self.generated_email.clone()),
            default_subject: DEFAULT_SUBJECT,
            onboarding: (!has_email).then_some(ONBOARDING_MESSAGE),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Render model for the page. The email and send sections are shown only when
/// `generated_email` is present; otherwise `onboarding` is.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    pub job_url: String,
    pub job_description: String,
    pub portfolio_rows: Vec<PortfolioRow>,
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_email: Option<String>,
    pub default_subject: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding: Option<&'static str>,
}

/// Process-memory session table. Nothing here is persisted.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Session {
        let session = Session::new();
        self.inner.write().await.insert(session.id, session.clone());
        info!("Session {} opened", session.id);
        session
    }

    pub async fn get(&self, id: Uuid) -> Option<Session> {
        self.inner.read().await.get(&id).cloned()
    }

    /// Writes the next state back. Returns `false` if the session was closed
    /// while the action ran, in which case the value is dropped.
    pub async fn put(&self, session: Session) -> bool {
        let mut sessions = self.inner.write().await;
        match sessions.get_mut(&session.id) {
            Some(slot) => {
                *slot = session;
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.inner.read().await.contains_key(&id)
    }

    pub async fn remove(&self, id: Uuid) -> Option<Session> {
        self.inner.write().await.remove(&id)
    }

    /// Drops sessions untouched for longer than `ttl`; returns their ids.
    pub async fn purge_idle(&self, ttl: Duration) -> Vec<Uuid> {
        let cutoff = Utc::now() - ttl;
        let mut sessions = self.inner.write().await;
        let expired: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.updated_at < cutoff)
            .map(|s| s.id)
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

/// Deletes persisted indexes whose session is not in `sessions`, including
/// directories left over from a previous run. Returns the removed ids.
pub async fn remove_orphaned_indexes(
    sessions: &SessionStore,
    store: &IndexStore,
) -> anyhow::Result<Vec<Uuid>> {
    let listing = store.clone();
    let persisted = tokio::task::spawn_blocking(move || listing.persisted_sessions()).await??;

    let mut orphans = Vec::new();
    for id in persisted {
        if !sessions.contains(id).await {
            orphans.push(id);
        }
    }
    if orphans.is_empty() {
        return Ok(orphans);
    }

    let store = store.clone();
    let ids = orphans.clone();
    tokio::task::spawn_blocking(move || ids.into_iter().try_for_each(|id| store.remove(id)))
        .await??;

    info!("Removed {} orphaned portfolio indexes", orphans.len());
    Ok(orphans)
}
