use serde::{Deserialize, Serialize};

/// One row of the uploaded portfolio table. Columns are positional:
/// index 0 is the tech stack, index 1 the link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioRow {
    pub tech_stack: String,
    pub link: String,
}

/// Text synthesized from a single `PortfolioRow` before splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortfolioDocument {
    pub content: String,
}

impl From<&PortfolioRow> for PortfolioDocument {
    fn from(row: &PortfolioRow) -> Self {
        Self {
            content: format!("Tech Stack: {}\nLink: {}", row.tech_stack, row.link),
        }
    }
}

/// A bounded-length slice of a portfolio document; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the source row in the uploaded table.
    pub document_index: usize,
    pub content: String,
}
