//! Job Scraper — best-effort extraction of a job description from a careers page.
//!
//! The heuristic is deliberately shallow: the first `h2`/`h3` carrying text is the
//! title, and the first `p` after it in document order is the summary. Pages listing
//! several openings yield the first match only.

use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::info;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Clone)]
pub struct JobScraper {
    client: Client,
}

impl JobScraper {
    pub fn new() -> Result<Self, ScrapeError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()?;

        Ok(Self { client })
    }

    /// Fetches `url` and returns the extracted description.
    /// An empty string means the page had no usable heading.
    pub async fn scrape(&self, url: &str) -> Result<String, ScrapeError> {
        info!("Fetching careers page: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ScrapeError::Status(response.status()));
        }

        let html = response.text().await?;
        Ok(extract_description(&html))
    }
}

/// Finds the first `h2`/`h3` with text and appends the next paragraph's text
/// after `" - "`. Returns an empty string when no heading qualifies.
pub fn extract_description(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("h2, h3, p") else {
        return String::new();
    };

    // `select` walks the tree in document order, so the paragraph search can
    // simply continue from where the heading was found.
    let mut elements = document.select(&selector);
    let heading = elements.by_ref().find_map(|el| {
        let is_heading = matches!(el.value().name(), "h2" | "h3");
        let text = stripped_text(el);
        (is_heading && !text.is_empty()).then_some(text)
    });

    let Some(mut description) = heading else {
        return String::new();
    };

    if let Some(paragraph) = elements.find(|el| el.value().name() == "p") {
        description.push_str(" - ");
        description.push_str(&stripped_text(paragraph));
    }

    description
}

/// Text of every descendant node, each trimmed, blanks dropped, joined by one space.
fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_followed_by_paragraph() {
        let html = r#"
            <html><body>
                <h1>Careers</h1>
                <h2>Backend Engineer</h2>
                <p>Build APIs</p>
                <p>Second paragraph</p>
            </body></html>
        "#;
        assert_eq!(extract_description(html), "Backend Engineer - Build APIs");
    }

    #[test]
    fn test_no_heading_yields_empty() {
        let html = "<html><body><h1>Jobs</h1><p>We are hiring</p></body></html>";
        assert_eq!(extract_description(html), "");
    }

    #[test]
    fn test_heading_without_paragraph() {
        let html = "<div><h3>  Data Engineer </h3><span>Remote</span></div>";
        assert_eq!(extract_description(html), "Data Engineer");
    }

    #[test]
    fn test_blank_heading_is_skipped() {
        let html = "<h2>   </h2><p>orphan</p><h3>Platform Engineer</h3><p>Own the infra</p>";
        assert_eq!(
            extract_description(html),
            "Platform Engineer - Own the infra"
        );
    }

    #[test]
    fn test_paragraph_before_heading_is_ignored() {
        let html = "<p>Intro text</p><h2>SRE</h2><div><p>Keep it running</p></div>";
        assert_eq!(extract_description(html), "SRE - Keep it running");
    }

    #[test]
    fn test_first_listing_wins_on_multi_listing_pages() {
        let html = "<h2>Frontend Engineer</h2><p>React</p><h2>Backend Engineer</h2><p>Rust</p>";
        assert_eq!(extract_description(html), "Frontend Engineer - React");
    }

    #[test]
    fn test_nested_markup_is_flattened() {
        let html = "<h2>Senior <em>Rust</em>\n Engineer</h2><p>Work on <b>storage</b> engines</p>";
        assert_eq!(
            extract_description(html),
            "Senior Rust Engineer - Work on storage engines"
        );
    }

    #[test]
    fn test_malformed_html_does_not_panic() {
        assert_eq!(extract_description("<h2>Title</h2><p>dangling"), "Title - dangling");
        assert_eq!(extract_description(""), "");
    }

    #[tokio::test]
    async fn test_scrape_unreachable_host_is_error() {
        let scraper = JobScraper::new().unwrap();
        let result = scraper.scrape("http://127.0.0.1:9/careers").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_scrape_invalid_url_is_error() {
        let scraper = JobScraper::new().unwrap();
        assert!(scraper.scrape("not a url").await.is_err());
    }

    /// Serves a careers page and a missing page on an ephemeral local port.
    async fn serve_careers_site() -> String {
        use axum::{http::StatusCode, response::Html as HtmlBody, routing::get, Router};

        let app = Router::new()
            .route(
                "/careers",
                get(|| async {
                    HtmlBody("<html><body><h2>Backend Engineer</h2><p>Build APIs</p></body></html>")
                }),
            )
            .route("/gone", get(|| async { (StatusCode::NOT_FOUND, "no such job") }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_scrape_live_page() {
        let base = serve_careers_site().await;
        let scraper = JobScraper::new().unwrap();
        let description = scraper.scrape(&format!("{base}/careers")).await.unwrap();
        assert_eq!(description, "Backend Engineer - Build APIs");
    }

    #[tokio::test]
    async fn test_scrape_non_success_status_is_error() {
        let base = serve_careers_site().await;
        let scraper = JobScraper::new().unwrap();
        let err = scraper.scrape(&format!("{base}/gone")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Status(status) if status.as_u16() == 404));
    }
}
