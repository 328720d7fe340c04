//! HTTP API handlers and routes.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions
//!
//! # API Endpoints
//!
//! ## Retrieval
//! - `POST /ingest` - Ingest text or a URL
//! - `GET /query?q=&top_k=&threshold=` - Ranked chunks for a query
//! - `POST /query` - Same, with a JSON body
//!
//! ## Documents
//! - `GET /documents` - Document summaries
//! - `GET /documents/{id}` - One document with its chunks
//!
//! ## System
//! - `GET /health` - Liveness
//! - `GET /status` - Index size, embedding model, chunking defaults
//! - `POST /admin/rebuild` - Rebuild the vector index from the document store
//!
//! # Errors
//!
//! Failures are returned as `{"error": "...", "kind": "..."}` with a status
//! code derived from [`AppError`](crate::types::AppError). Query failures
//! after validation are the exception: they return 200 with an empty
//! result list and the `error` field set.
//!
//! # OpenAPI Documentation
//!
//! When the `swagger-ui` feature is enabled, interactive API documentation
//! is available at `/swagger-ui/`.

use crate::types::{
    ChunkView, Document, DocumentDetail, DocumentListResponse, DocumentSummary, HealthResponse,
    IngestRequest, IngestResponse, MetadataValue, QueryRequest, QueryResponse, QueryResultItem,
    RebuildResponse, SourceType, StatusResponse,
};
use utoipa::OpenApi;

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ragbench",
        description = "Retrieval backend: chunking, embedding, vector search and document storage"
    ),
    paths(
        handlers::rag::ingest,
        handlers::rag::query,
        handlers::rag::query_json,
        handlers::documents::list_documents,
        handlers::documents::get_document,
        handlers::system::health,
        handlers::system::status,
        handlers::system::rebuild,
    ),
    components(schemas(
        IngestRequest,
        IngestResponse,
        QueryRequest,
        QueryResponse,
        QueryResultItem,
        StatusResponse,
        HealthResponse,
        Document,
        DocumentSummary,
        DocumentDetail,
        DocumentListResponse,
        ChunkView,
        RebuildResponse,
        SourceType,
        MetadataValue,
    )),
    tags(
        (name = "rag", description = "Ingestion and retrieval"),
        (name = "documents", description = "Stored documents"),
        (name = "system", description = "Health, status and maintenance")
    )
)]
pub struct ApiDoc;
