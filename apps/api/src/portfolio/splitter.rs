//! Character splitter: cuts text on a separator, then greedily merges the pieces
//! back into chunks of at most `chunk_size` characters, carrying up to
//! `chunk_overlap` characters of trailing context into the next chunk.
//!
//! Lengths are counted in `char`s throughout.

use std::collections::VecDeque;

use tracing::debug;

use crate::models::portfolio::{Chunk, PortfolioDocument};

pub const CHUNK_SIZE: usize = 300;
pub const CHUNK_OVERLAP: usize = 50;
const SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone)]
pub struct TextSplitter {
    separator: String,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(CHUNK_SIZE, CHUNK_OVERLAP)
    }
}

impl TextSplitter {
    /// `chunk_overlap` is clamped below `chunk_size` so hard windows always advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            separator: SEPARATOR.to_string(),
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Splits every document, tagging chunks with the index of their source document.
    pub fn split_documents(&self, documents: &[PortfolioDocument]) -> Vec<Chunk> {
        documents
            .iter()
            .enumerate()
            .flat_map(|(document_index, doc)| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(move |content| Chunk {
                        document_index,
                        content,
                    })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces: Vec<String> = text
            .split(self.separator.as_str())
            .filter(|s| !s.is_empty())
            .flat_map(|s| self.window(s))
            .collect();

        self.merge(&pieces)
    }

    /// Cuts a piece longer than `chunk_size` into overlapping fixed windows.
    fn window(&self, piece: &str) -> Vec<String> {
        let chars: Vec<char> = piece.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![piece.to_string()];
        }

        debug!(
            "Piece of {} chars exceeds chunk size {}, windowing",
            chars.len(),
            self.chunk_size
        );

        let step = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(chars.len());
            windows.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        windows
    }

    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let sep_len = self.separator.chars().count();
        let mut chunks = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = piece.chars().count();
            let joined_len = |current: &VecDeque<(&str, usize)>, total: usize| {
                total + len + if current.is_empty() { 0 } else { sep_len }
            };

            if joined_len(&current, total) > self.chunk_size && !current.is_empty() {
                self.push_joined(&current, &mut chunks);

                // Drop from the front until what is left fits as overlap and
                // leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (joined_len(&current, total) > self.chunk_size && total > 0)
                {
                    let Some((_, front_len)) = current.pop_front() else {
                        break;
                    };
                    total -= front_len + if current.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if current.is_empty() { 0 } else { sep_len };
            current.push_back((piece.as_str(), len));
        }

        self.push_joined(&current, &mut chunks);
        chunks
    }

    fn push_joined(&self, current: &VecDeque<(&str, usize)>, chunks: &mut Vec<String>) {
        let joined = current
            .iter()
            .map(|(s, _)| *s)
            .collect::<Vec<_>>()
            .join(&self.separator);
        let trimmed = joined.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
    }
}
