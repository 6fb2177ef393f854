pub mod health;
pub mod page;

use axum::{
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(page::index_handler))
        .route("/health", get(health::health_handler))
        .route("/api/v1/sessions", post(handlers::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::handle_get_session).delete(handlers::handle_delete_session),
        )
        .route("/api/v1/sessions/:id/job-url", post(handlers::handle_job_url))
        .route(
            "/api/v1/sessions/:id/portfolio",
            post(handlers::handle_upload_portfolio),
        )
        .route("/api/v1/sessions/:id/generate", post(handlers::handle_generate))
        .route("/api/v1/sessions/:id/send", post(handlers::handle_send))
        .with_state(state)
}
