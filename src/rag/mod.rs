//! Retrieval pipeline.
//!
//! # Module Structure
//!
//! - [`chunker`] - Character-window text chunking and text cleanup
//! - [`embeddings`] - The [`Embedder`](embeddings::Embedder) capability and the hashing backend
//! - [`remote`] - OpenAI-compatible embedding API client
//! - `local` - fastembed ONNX models (feature `local-embeddings`)
//! - [`fetch`] - URL fetching and HTML text extraction
//! - [`ingest`] - Ingestion pipeline, reconciliation and index rebuild
//! - [`retriever`] - Query embedding, vector search and chunk resolution
//! - [`service`] - The components wired together from configuration
//!
//! # Flow
//!
//! 1. **Ingestion** - text is chunked, embedded in one batch, written to the
//!    document store, added to the vector index, and the index is persisted
//! 2. **Retrieval** - the query is embedded, the index returns ranked
//!    `(document_id, chunk_index)` hits, and the store resolves them to text
//!    and metadata
//!
//! # Example
//!
//! ```rust,ignore
//! use ragbench::rag::service::RagService;
//! use ragbench::types::{IngestRequest, QueryRequest};
//!
//! let service = RagService::open(config).await?;
//! service.ingest(IngestRequest { content: Some(text), ..Default::default() }).await?;
//! let response = service.query(QueryRequest { query: "ownership".into(), top_k: Some(3), threshold: None }).await?;
//! ```

pub mod chunker;
pub mod embeddings;
pub mod fetch;
pub mod ingest;
#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod remote;
pub mod retriever;
pub mod service;
