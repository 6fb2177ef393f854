//! In-memory similarity index over portfolio chunks, persisted as JSON under
//! `{index_dir}/{session_id}/index.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::PortfolioError;
use crate::models::portfolio::{Chunk, PortfolioRow};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Ordered (chunk, vector) pairs queried by squared L2 distance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioIndex {
    /// SHA-256 of the uploaded file the index was built from.
    pub content_hash: String,
    pub embedding_model: String,
    /// Parsed rows kept for preview.
    pub rows: Vec<PortfolioRow>,
    pub entries: Vec<IndexEntry>,
}

impl PortfolioIndex {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns up to `k` chunks closest to `query`, nearest first.
    /// Equal distances keep insertion order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Vec<&Chunk> {
        let mut scored: Vec<(f32, usize)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (squared_l2(&entry.vector, query), i))
            .collect();

        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(k)
            .map(|(_, i)| &self.entries[i].chunk)
            .collect()
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// On-disk persistence root for session indexes.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, session_id: Uuid) -> PathBuf {
        self.root.join(session_id.to_string()).join(INDEX_FILE)
    }

    /// Overwrites the session's persisted index. Written to a temp file first
    /// so a crash never leaves a truncated index behind.
    pub fn save(&self, session_id: Uuid, index: &PortfolioIndex) -> Result<(), PortfolioError> {
        let path = self.path_for(session_id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(index)?)?;
        fs::rename(&tmp, &path)?;
        debug!("Persisted index for session {} at {}", session_id, path.display());
        Ok(())
    }

    /// Loads the session's persisted index, if any. Unreadable files count as absent.
    pub fn load(&self, session_id: Uuid) -> Option<PortfolioIndex> {
        let path = self.path_for(session_id);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Ignoring unreadable index at {}: {e}", path.display());
                None
            }
        }
    }

    /// Ids of every session with a directory under the root. Entries that are
    /// not session directories are ignored.
    pub fn persisted_sessions(&self) -> Result<Vec<Uuid>, PortfolioError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(id) = entry.file_name().to_str().and_then(|n| Uuid::parse_str(n).ok()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Removes everything persisted for the session.
    pub fn remove(&self, session_id: Uuid) -> Result<(), PortfolioError> {
        let dir = self.root.join(session_id.to_string());
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                document_index: 0,
                content: content.to_string(),
            },
            vector,
        }
    }

    fn index(entries: Vec<IndexEntry>) -> PortfolioIndex {
        PortfolioIndex {
            content_hash: "abc".to_string(),
            embedding_model: "test".to_string(),
            rows: vec![],
            entries,
        }
    }

    #[test]
    fn test_nearest_picks_smallest_distance() {
        let idx = index(vec![
            entry("far", vec![10.0, 10.0]),
            entry("near", vec![1.0, 1.0]),
            entry("mid", vec![3.0, 3.0]),
        ]);
        let hits = idx.nearest(&[0.0, 0.0], 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "near");

        let top2: Vec<_> = idx.nearest(&[0.0, 0.0], 2).iter().map(|c| c.content.clone()).collect();
        assert_eq!(top2, vec!["near", "mid"]);
    }

    #[test]
    fn test_nearest_on_empty_index() {
        let idx = index(vec![]);
        assert!(idx.nearest(&[0.0, 0.0], 1).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let idx = index(vec![entry("first", vec![1.0]), entry("second", vec![-1.0])]);
        assert_eq!(idx.nearest(&[0.0], 1)[0].content, "first");
    }

    #[test]
    fn test_store_save_load_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let session_id = Uuid::new_v4();

        assert!(store.load(session_id).is_none());

        store.save(session_id, &index(vec![entry("one", vec![1.0])])).unwrap();
        let loaded = store.load(session_id).unwrap();
        assert_eq!(loaded.len(), 1);

        let mut replacement = index(vec![entry("two", vec![2.0]), entry("three", vec![3.0])]);
        replacement.content_hash = "def".to_string();
        store.save(session_id, &replacement).unwrap();
        let loaded = store.load(session_id).unwrap();
        assert_eq!(loaded.content_hash, "def");
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn test_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let session_id = Uuid::new_v4();
        let path = store.path_for(session_id);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"{not json").unwrap();
        assert!(store.load(session_id).is_none());
    }

    #[test]
    fn test_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let session_id = Uuid::new_v4();
        store.save(session_id, &index(vec![])).unwrap();
        store.remove(session_id).unwrap();
        assert!(store.load(session_id).is_none());
        store.remove(session_id).unwrap();
    }

    #[test]
    fn test_persisted_sessions_lists_session_dirs_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("missing"));
        assert!(store.persisted_sessions().unwrap().is_empty());

        let store = IndexStore::new(dir.path());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.save(a, &index(vec![])).unwrap();
        store.save(b, &index(vec![])).unwrap();
        fs::create_dir_all(dir.path().join("not-a-session")).unwrap();
        fs::write(dir.path().join(Uuid::new_v4().to_string()), b"stray file").unwrap();

        let mut ids = store.persisted_sessions().unwrap();
        ids.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(ids, expected);
    }
}
