//! API request handlers.

/// Document listing and lookup.
pub mod documents;
/// Ingestion and query.
pub mod rag;
/// Health, status and index maintenance.
pub mod system;
