//! # ragbench - retrieval backend for agent benchmarks
//!
//! A small retrieval service that agent-framework runners call to ingest
//! documents and fetch relevant context: character-window chunking,
//! pluggable embedding backends, an exact or HNSW cosine vector index, and
//! a file-backed document store, behind an HTTP API.
//!
//! ## Overview
//!
//! ragbench can be used in two ways:
//!
//! 1. **As a standalone server** - Run the `ragbench-server` binary
//! 2. **As a library** - Build a [`RagService`] and call it directly
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use ragbench::{RagBenchConfig, RagService};
//! use ragbench::types::{IngestRequest, QueryRequest};
//! use std::sync::Arc;
//!
//! let config = Arc::new(RagBenchConfig::load("ragbench.toml")?);
//! let service = RagService::open(config).await?;
//!
//! service.ingest(IngestRequest {
//!     content: Some("Rust guarantees memory safety without a garbage collector.".into()),
//!     ..Default::default()
//! }).await?;
//!
//! let response = service.query(QueryRequest {
//!     query: "memory safety".into(),
//!     top_k: Some(3),
//!     threshold: None,
//! }).await?;
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `local-embeddings` | fastembed ONNX models for `[embedding] backend = "local"` |
//! | `swagger-ui` | Interactive API docs at `/swagger-ui` |
//! | `full` | Everything above |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line interface
//! - [`db`] - Document storage
//! - [`rag`] - Chunking, embedding, ingestion and retrieval
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration
//!
//! The vector index itself lives in the `ragbench-vector` workspace crate.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Document storage.
pub mod db;
/// Retrieval pipeline components.
pub mod rag;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use db::{DocumentStore, FileDocumentStore};
pub use rag::embeddings::{Embedder, EmbeddingError, HashingEmbedder};
pub use rag::service::RagService;
pub use types::{AppError, Result};
pub use utils::toml_config::RagBenchConfig;

use axum::http::{header, Method};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Configuration the service was built from
    pub config: Arc<RagBenchConfig>,
    /// The retrieval service
    pub rag: Arc<RagService>,
}

impl AppState {
    pub fn new(rag: Arc<RagService>) -> Self {
        Self {
            config: rag.config().clone(),
            rag,
        }
    }
}

/// The full application router with middleware applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    let body_limit = state.config.server.request_body_limit_bytes;

    let router = Router::new().merge(api::routes::create_router());

    #[cfg(feature = "swagger-ui")]
    let router = {
        use utoipa::OpenApi;
        router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    // Outermost first: the request id exists before tracing starts.
    router.with_state(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors)
            .layer(CompressionLayer::new())
            .map_response(axum::response::IntoResponse::into_response)
            .layer(RequestBodyLimitLayer::new(body_limit)),
    )
}
