use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// GET /
/// The single-page front end; all state lives behind the session API.
pub async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}
