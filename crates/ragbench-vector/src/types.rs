//! Common types for ragbench-vector.

use crate::config::IndexAlgorithm;

/// One vector to be added to the index, with the chunk it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Owning document.
    pub document_id: String,
    /// 0-based position of the chunk within its document.
    pub chunk_index: usize,
}

impl IndexEntry {
    /// Create a new entry.
    pub fn new(vector: Vec<f32>, document_id: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            vector,
            document_id: document_id.into(),
            chunk_index,
        }
    }
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Owning document.
    pub document_id: String,
    /// Chunk position within the document.
    pub chunk_index: usize,
    /// Cosine similarity to the query (higher = more similar).
    pub score: f32,
}

/// Statistics about an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    /// Number of entries.
    pub entries: usize,
    /// Number of distinct documents referenced.
    pub documents: usize,
    /// Fixed dimension, if any vector has been added or one was configured.
    pub dimension: Option<usize>,
    /// Search algorithm.
    pub algorithm: IndexAlgorithm,
    /// Embedding model recorded for the vectors.
    pub embedding_model: Option<String>,
}
