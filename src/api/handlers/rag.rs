//! Ingestion and query handlers.

use crate::{
    types::{IngestRequest, IngestResponse, QueryParams, QueryRequest, QueryResponse, Result},
    AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};

// ============================================================================
// Ingest Endpoint
// ============================================================================

/// Ingest a document.
///
/// Exactly one of `content` and `url` must be set. Re-ingesting identical
/// content and metadata replaces the earlier chunks.
#[utoipa::path(
    post,
    path = "/ingest",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Document ingested", body = IngestResponse),
        (status = 400, description = "Invalid request or chunk parameters"),
        (status = 502, description = "URL could not be fetched"),
        (status = 503, description = "Embedding backend unavailable"),
        (status = 500, description = "Storage failure")
    ),
    tag = "rag"
)]
pub async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestResponse>> {
    Ok(Json(state.rag.ingest(payload).await?))
}

// ============================================================================
// Query Endpoints
// ============================================================================

/// Query with URL parameters.
#[utoipa::path(
    get,
    path = "/query",
    params(QueryParams),
    responses(
        (status = 200, description = "Ranked results; `error` is set if the query failed", body = QueryResponse),
        (status = 400, description = "Invalid query")
    ),
    tag = "rag"
)]
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>> {
    Ok(Json(state.rag.query(params.into()).await?))
}

/// Query with a JSON body.
#[utoipa::path(
    post,
    path = "/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Ranked results; `error` is set if the query failed", body = QueryResponse),
        (status = 400, description = "Invalid query")
    ),
    tag = "rag"
)]
pub async fn query_json(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    Ok(Json(state.rag.query(payload).await?))
}
