//! Portfolio Indexer and Retriever.
//!
//! Upload flow: CSV bytes → rows → one document per row → chunks (300/50) →
//! embeddings → fresh `PortfolioIndex`, persisted per session. Retrieval is a
//! top-1 nearest-neighbour lookup of the job description.

pub mod embedder;
pub mod index;
pub mod splitter;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::portfolio::{PortfolioDocument, PortfolioRow};
use embedder::Embedder;
use index::{IndexEntry, IndexStore, PortfolioIndex};
use splitter::TextSplitter;

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: expected at least 2 columns (tech stack, link), found {found}")]
    TooFewColumns { line: u64, found: usize },

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("index storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("index serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Parses the uploaded table. The first line is a header; columns are read by
/// position and anything past the second is ignored.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<PortfolioRow>, PortfolioError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = reader.headers()?;
    if headers.len() < 2 {
        return Err(PortfolioError::TooFewColumns {
            line: 1,
            found: headers.len(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        match (record.get(0), record.get(1)) {
            (Some(tech_stack), Some(link)) => rows.push(PortfolioRow {
                tech_stack: tech_stack.to_string(),
                link: link.to_string(),
            }),
            _ => {
                return Err(PortfolioError::TooFewColumns {
                    line,
                    found: record.len(),
                })
            }
        }
    }

    Ok(rows)
}

/// SHA-256 hex of the uploaded bytes; keys index reuse.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Builds the session's index from an uploaded CSV, replacing whatever was
/// persisted before. Identical re-uploads reuse the persisted embeddings.
///
/// Blocking: run inside `spawn_blocking`.
pub fn build_index(
    bytes: &[u8],
    embedder: &dyn Embedder,
    store: &IndexStore,
    session_id: Uuid,
) -> Result<PortfolioIndex, PortfolioError> {
    let rows = parse_rows(bytes)?;
    let hash = content_hash(bytes);

    if let Some(existing) = store.load(session_id) {
        if existing.content_hash == hash && existing.embedding_model == embedder.model_name() {
            info!("Session {}: portfolio unchanged, reusing persisted index", session_id);
            return Ok(existing);
        }
    }

    let documents: Vec<PortfolioDocument> = rows.iter().map(PortfolioDocument::from).collect();
    let chunks = TextSplitter::default().split_documents(&documents);
    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder.embed(&texts).map_err(PortfolioError::Embedding)?;

    if vectors.len() != chunks.len() {
        return Err(PortfolioError::Embedding(anyhow::anyhow!(
            "embedder returned {} vectors for {} chunks",
            vectors.len(),
            chunks.len()
        )));
    }

    let index = PortfolioIndex {
        content_hash: hash,
        embedding_model: embedder.model_name().to_string(),
        rows,
        entries: chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect(),
    };

    info!(
        "Session {}: indexed {} documents into {} chunks",
        session_id,
        documents.len(),
        index.len()
    );

    store.save(session_id, &index)?;
    Ok(index)
}

/// Top-1 lookup of `query` against `index`. An empty index yields `None`
/// without touching the embedder.
///
/// Blocking: run inside `spawn_blocking`.
pub fn retrieve(
    index: &PortfolioIndex,
    embedder: &dyn Embedder,
    query: &str,
) -> Result<Option<String>, PortfolioError> {
    if index.is_empty() {
        return Ok(None);
    }

    let query_vector = embedder
        .embed(&[query.to_string()])
        .map_err(PortfolioError::Embedding)?
        .into_iter()
        .next()
        .ok_or_else(|| PortfolioError::Embedding(anyhow::anyhow!("no vector for query")))?;

    Ok(index
        .nearest(&query_vector, 1)
        .first()
        .map(|chunk| chunk.content.clone()))
}
