//! Axum route handlers, one per user action.
//!
//! Each action loads the session, computes the next session value and writes it
//! back. Recoverable failures come back as notices alongside the new view.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::generator::generate_email;
use crate::generation::prompts::combine_inputs;
use crate::mailer::{EmailMessage, SmtpCredentials, DEFAULT_SUBJECT};
use crate::models::notice::Notice;
use crate::portfolio::{build_index, retrieve};
use crate::session::{Session, SessionView};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JobUrlRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub sender_email: String,
    pub sender_password: String,
    pub recipient_email: String,
    pub subject: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub notices: Vec<Notice>,
    pub view: SessionView,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn load_session(state: &AppState, id: Uuid) -> Result<Session, AppError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

async fn commit(
    state: &AppState,
    session: Session,
    notices: Vec<Notice>,
) -> Result<Json<ActionResponse>, AppError> {
    let view = session.view();
    if !state.sessions.put(session).await {
        return Err(AppError::NotFound(format!(
            "Session {} was closed",
            view.session_id
        )));
    }
    Ok(Json(ActionResponse { notices, view }))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionView>) {
    let session = state.sessions.create().await;
    (StatusCode::CREATED, Json(session.view()))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(load_session(&state, id).await?.view()))
}

/// DELETE /api/v1/sessions/:id
///
/// Drops the session and its persisted index.
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .remove(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;

    let store = state.index_store.clone();
    tokio::task::spawn_blocking(move || store.remove(id))
        .await
        .map_err(|e| AppError::Internal(e.into()))??;

    info!("Session {} closed", id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/sessions/:id/job-url
///
/// Scrapes the careers page. Failures leave an empty description and an error notice.
pub async fn handle_job_url(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<JobUrlRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let session = load_session(&state, id).await?;
    let url = request.url.trim().to_string();

    if url.is_empty() {
        return commit(&state, session.with_job(url, String::new()), vec![]).await;
    }

    let (description, notices) = match state.scraper.scrape(&url).await {
        Ok(description) => {
            info!("Session {}: scraped job description ({} chars)", id, description.len());
            (description, vec![Notice::success("Job data scraped successfully")])
        }
        Err(e) => {
            warn!("Session {}: scrape of {} failed: {}", id, url, e);
            (String::new(), vec![Notice::error(format!("Error scraping URL: {e}"))])
        }
    };

    commit(&state, session.with_job(url, description), notices).await
}

/// POST /api/v1/sessions/:id/portfolio
///
/// Multipart upload with a `file` field holding the portfolio CSV. A malformed
/// table fails the request and keeps the previous index.
pub async fn handle_upload_portfolio(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<ActionResponse>, AppError> {
    let session = load_session(&state, id).await?;

    let mut upload: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Could not read upload: {e}")))?;
            upload = Some(bytes);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| AppError::Validation("Missing 'file' field".to_string()))?;

    let embedder = state.embedder.clone();
    let store = state.index_store.clone();
    let index = tokio::task::spawn_blocking(move || {
        build_index(&bytes, embedder.as_ref(), &store, id)
    })
    .await
    .map_err(|e| AppError::Internal(e.into()))??;

    let notices = vec![Notice::success(format!(
        "Portfolio indexed: {} rows, {} chunks",
        index.rows.len(),
        index.len()
    ))];

    let committed = commit(&state, session.with_portfolio(index), notices).await;
    if committed.is_err() {
        // Closed while indexing: the index just written has no owner.
        let store = state.index_store.clone();
        tokio::task::spawn_blocking(move || store.remove(id))
            .await
            .map_err(|e| AppError::Internal(e.into()))??;
        warn!("Session {} closed during upload, discarded its index", id);
    }
    committed
}

/// POST /api/v1/sessions/:id/generate
///
/// Retrieves the closest portfolio snippet for the job description and asks the
/// model for a cold email. A failed generation keeps the previously held email.
pub async fn handle_generate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionResponse>, AppError> {
    let session = load_session(&state, id).await?;
    let index = session.portfolio.clone().ok_or_else(|| {
        AppError::Validation("Upload a portfolio before generating an email".to_string())
    })?;

    let embedder = state.embedder.clone();
    let query = session.job_description.clone();
    let relevant_portfolio =
        tokio::task::spawn_blocking(move || retrieve(&index, embedder.as_ref(), &query))
            .await
            .map_err(|e| AppError::Internal(e.into()))??
            .unwrap_or_default();

    let mut notices = Vec::new();
    if relevant_portfolio.is_empty() {
        notices.push(Notice::info(
            "Portfolio has no entries; generating without a portfolio snippet",
        ));
    }

    let combined = combine_inputs(&session.job_description, &relevant_portfolio);
    let outcome = generate_email(state.llm.as_ref(), &combined, state.retry).await;
    notices.extend(outcome.notices);

    commit(&state, session.with_generation(outcome.email), notices).await
}

/// POST /api/v1/sessions/:id/send
///
/// Sends the held email. Failures are reported as notices; the email is kept
/// so the send can be retried.
pub async fn handle_send(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SendRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    let session = load_session(&state, id).await?;
    if session.generated_email.is_empty() {
        return Err(AppError::Validation(
            "Generate an email before sending".to_string(),
        ));
    }

    let message = EmailMessage {
        from: request.sender_email.clone(),
        to: request.recipient_email,
        subject: request
            .subject
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
        body: session.generated_email.clone(),
    };
    let credentials = SmtpCredentials {
        username: request.sender_email,
        password: request.sender_password,
    };

    let notice = match state.mailer.send(&message, &credentials).await {
        Ok(()) => {
            info!("Session {}: email sent to {}", id, message.to);
            Notice::success("Email sent successfully!")
        }
        Err(e) => {
            warn!("Session {}: send failed: {}", id, e);
            Notice::error(format!("Error sending email: {e}"))
        }
    };

    commit(&state, session.touch(), vec![notice]).await
}
