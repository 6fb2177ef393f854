//! Sentence embedders used to index portfolio chunks and embed queries.
//!
//! `FastEmbedder` wraps fastembed's all-MiniLM-L6-v2 (384 dims).
//! `HashEmbedder` produces deterministic SHA-256 vectors for offline runs and tests.

use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingBackend;

/// Dimensionality of all-MiniLM-L6-v2 vectors.
pub const EMBEDDING_DIM: usize = 384;

/// Synchronous embedding backend. Callers on the async runtime must go
/// through `tokio::task::spawn_blocking`.
pub trait Embedder: Send + Sync {
    /// Identifier stored alongside persisted vectors.
    fn model_name(&self) -> &str;

    /// Embeds each text into a fixed-length vector, preserving order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Builds the configured backend. Selecting fastembed and failing to load the
/// model is a startup error; the hash embedder is only used when asked for.
pub fn init(backend: EmbeddingBackend) -> Result<Box<dyn Embedder>> {
    init_with(backend, FastEmbedder::try_new)
}

fn init_with<E, F>(backend: EmbeddingBackend, load_model: F) -> Result<Box<dyn Embedder>>
where
    E: Embedder + 'static,
    F: FnOnce() -> Result<E>,
{
    match backend {
        EmbeddingBackend::Hash => {
            tracing::warn!("Embedder: hash backend active (EMBEDDING_BACKEND=hash), retrieval is not semantic");
            Ok(Box::new(HashEmbedder))
        }
        EmbeddingBackend::FastEmbed => {
            let embedder = load_model()
                .context("EMBEDDING_BACKEND=fastembed but all-MiniLM-L6-v2 could not be loaded")?;
            tracing::info!("Embedder: {} loaded", embedder.model_name());
            Ok(Box::new(embedder))
        }
    }
}

/// `TextEmbedding` is kept behind a `Mutex` so the embedder is `Sync`.
pub struct FastEmbedder {
    model: Mutex<fastembed::TextEmbedding>,
}

impl FastEmbedder {
    pub fn try_new() -> Result<Self> {
        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(fastembed::EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false),
        )
        .context("failed to load all-MiniLM-L6-v2")?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        "all-MiniLM-L6-v2"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self
            .model
            .lock()
            .map_err(|_| anyhow!("embedder mutex poisoned"))?;
        model
            .embed(texts.to_vec(), None)
            .context("embedding batch failed")
    }
}

pub struct HashEmbedder;

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "sha256-hash"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t)).collect())
    }
}

/// Deterministic vector from the SHA-256 of `text`, normalised to [-1, 1].
fn hash_embed(text: &str) -> Vec<f32> {
    let digest = Sha256::digest(text.as_bytes());
    (0..EMBEDDING_DIM)
        .map(|i| (digest[i % digest.len()] as f32 / 255.0) * 2.0 - 1.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let texts = vec!["Rust backend".to_string(), "React frontend".to_string()];
        let first = HashEmbedder.embed(&texts).unwrap();
        let second = HashEmbedder.embed(&texts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|v| v.len() == EMBEDDING_DIM));
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_hash_embed_range() {
        let v = hash_embed("anything");
        assert!(v.iter().all(|x| (-1.0..=1.0).contains(x)));
    }

    #[test]
    fn test_init_hash_backend() {
        let embedder = init(EmbeddingBackend::Hash).unwrap();
        assert_eq!(embedder.model_name(), "sha256-hash");
    }

    #[test]
    fn test_model_load_failure_is_an_error() {
        let result = init_with(EmbeddingBackend::FastEmbed, || -> Result<HashEmbedder> {
            Err(anyhow!("no network"))
        });
        let err = match result {
            Ok(_) => panic!("expected startup to fail without the model"),
            Err(e) => e,
        };
        assert!(format!("{err:#}").contains("could not be loaded"));
        assert!(format!("{err:#}").contains("no network"));
    }

    #[test]
    fn test_hash_backend_never_loads_model() {
        let embedder = init_with(EmbeddingBackend::Hash, || -> Result<HashEmbedder> {
            panic!("model must not be loaded for the hash backend")
        })
        .unwrap();
        assert_eq!(embedder.model_name(), "sha256-hash");
    }
}
