//! Document storage abstraction.
//!
//! A [`DocumentStore`] is the durable source of truth for ingested
//! documents and their chunks. The vector index can always be rebuilt from
//! it, so every write here must complete before the index is touched.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragbench::db::{DocumentStore, FileDocumentStore};
//!
//! let store = FileDocumentStore::open("./data/documents").await?;
//! store.put_with_chunks(document, chunks, Some("feature-hashing-v1")).await?;
//! let text = store.get_chunk_text(&id, 0).await?;
//! ```

use crate::types::{AppError, Chunk, Document, DocumentSummary, Result};
use async_trait::async_trait;

/// Longest accepted document id.
pub const MAX_DOCUMENT_ID_LEN: usize = 128;

/// Abstract trait for document storage.
///
/// Writes for distinct ids are independent; writes to the same id are
/// serialized by the implementation. Lookups of unknown ids fail with
/// [`AppError::NotFound`].
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ============== Document Operations ==============

    /// Store a document, replacing any existing document (and its chunks)
    /// with the same id.
    async fn put(&self, document: Document) -> Result<()>;

    /// Fetch a document by id.
    async fn get(&self, document_id: &str) -> Result<Document>;

    /// Summaries of all stored documents, oldest first.
    async fn list(&self) -> Result<Vec<DocumentSummary>>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize> {
        Ok(self.list().await?.len())
    }

    // ============== Chunk Operations ==============

    /// Replace the chunks of an existing document.
    async fn put_chunks(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<()>;

    /// Text of one chunk.
    async fn get_chunk_text(&self, document_id: &str, chunk_index: usize) -> Result<String>;

    /// All chunks of a document, ordered by `chunk_index`.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Embedding model that produced the stored chunk embeddings.
    async fn embedding_model(&self, document_id: &str) -> Result<Option<String>>;

    /// Store a document and its chunks as one write.
    ///
    /// The default implementation issues `put` then `put_chunks`;
    /// implementations that can write both at once should override it.
    async fn put_with_chunks(
        &self,
        document: Document,
        chunks: Vec<Chunk>,
        embedding_model: Option<&str>,
    ) -> Result<()> {
        let _ = embedding_model;
        let id = document.id.clone();
        self.put(document).await?;
        self.put_chunks(&id, chunks).await
    }
}

/// Check that a document id is usable as a storage key.
///
/// Ids are limited to ASCII letters, digits, `-`, `_` and `.`, must not
/// start with `.` and are at most [`MAX_DOCUMENT_ID_LEN`] bytes.
pub fn validate_document_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > MAX_DOCUMENT_ID_LEN {
        return Err(AppError::InvalidInput(format!(
            "document id must be 1..={} characters",
            MAX_DOCUMENT_ID_LEN
        )));
    }
    if id.starts_with('.')
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AppError::InvalidInput(format!(
            "document id '{}' may only contain letters, digits, '-', '_' and '.'",
            id
        )));
    }
    Ok(())
}

/// Check that chunks belong to `document_id` and are numbered 0..n.
pub fn validate_chunks(document_id: &str, chunks: &[Chunk]) -> Result<()> {
    for (expected, chunk) in chunks.iter().enumerate() {
        if chunk.document_id != document_id {
            return Err(AppError::InvalidInput(format!(
                "chunk {} belongs to '{}', not '{}'",
                chunk.chunk_index, chunk.document_id, document_id
            )));
        }
        if chunk.chunk_index != expected {
            return Err(AppError::InvalidInput(format!(
                "chunk indices of '{}' must be contiguous from 0 (found {} at position {})",
                document_id, chunk.chunk_index, expected
            )));
        }
    }
    Ok(())
}
