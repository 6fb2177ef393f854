use std::path::PathBuf;

use anyhow::{Context, Result};

/// Mail relay used when `SMTP_HOST` is not set.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
/// Submission port used when `SMTP_PORT` is not set.
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Which embedding backend the portfolio indexer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingBackend {
    /// all-MiniLM-L6-v2 via fastembed (downloads the model on first start).
    FastEmbed,
    /// Deterministic SHA-256 vectors. Offline use only.
    Hash,
}

impl EmbeddingBackend {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fastembed" | "" => Ok(Self::FastEmbed),
            "hash" => Ok(Self::Hash),
            other => anyhow::bail!("EMBEDDING_BACKEND must be 'fastembed' or 'hash', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub groq_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Persistence root for portfolio indexes. Rebuilt on every upload.
    pub index_dir: PathBuf,
    pub embedding_backend: EmbeddingBackend,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub session_ttl_minutes: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            groq_api_key: require_env("GROQ_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            index_dir: std::env::var("INDEX_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("chroma_data")),
            embedding_backend: EmbeddingBackend::parse(
                &std::env::var("EMBEDDING_BACKEND").unwrap_or_default(),
            )?,
            smtp_host: std::env::var("SMTP_HOST").unwrap_or_else(|_| DEFAULT_SMTP_HOST.to_string()),
            smtp_port: match std::env::var("SMTP_PORT") {
                Ok(raw) => raw
                    .parse::<u16>()
                    .context("SMTP_PORT must be a valid port number")?,
                Err(_) => DEFAULT_SMTP_PORT,
            },
            session_ttl_minutes: match std::env::var("SESSION_TTL_MINUTES") {
                Ok(raw) => raw
                    .parse::<i64>()
                    .context("SESSION_TTL_MINUTES must be an integer")?,
                Err(_) => 120,
            },
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_backend_parse() {
        assert_eq!(EmbeddingBackend::parse("").unwrap(), EmbeddingBackend::FastEmbed);
        assert_eq!(EmbeddingBackend::parse("FastEmbed").unwrap(), EmbeddingBackend::FastEmbed);
        assert_eq!(EmbeddingBackend::parse(" hash ").unwrap(), EmbeddingBackend::Hash);
        assert!(EmbeddingBackend::parse("openai").is_err());
    }
}
