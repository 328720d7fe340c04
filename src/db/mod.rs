//! Document storage.
//!
//! - [`DocumentStore`]: the storage abstraction ingestion and retrieval use
//! - [`FileDocumentStore`]: one JSON file per document under `[storage] documents_path`

pub mod file_store;
pub mod traits;

pub use file_store::FileDocumentStore;
pub use traits::{validate_document_id, DocumentStore};
