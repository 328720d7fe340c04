//! Health, status and maintenance handlers.

use crate::{
    types::{HealthResponse, RebuildResponse, Result, StatusResponse},
    AppState,
};
use axum::{extract::State, Json};

/// Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse)),
    tag = "system"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Index size, embedding model and chunking defaults.
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Service status", body = StatusResponse)),
    tag = "system"
)]
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    Ok(Json(state.rag.status().await?))
}

/// Rebuild the vector index from the document store.
#[utoipa::path(
    post,
    path = "/admin/rebuild",
    responses(
        (status = 200, description = "Index rebuilt and persisted", body = RebuildResponse),
        (status = 503, description = "Embedding backend unavailable while re-embedding"),
        (status = 500, description = "Storage failure")
    ),
    tag = "system"
)]
pub async fn rebuild(State(state): State<AppState>) -> Result<Json<RebuildResponse>> {
    let start = std::time::Instant::now();
    let response = state.rag.rebuild().await?;
    tracing::info!(
        documents = response.documents,
        vector_store_size = response.vector_store_size,
        duration_ms = start.elapsed().as_millis() as u64,
        "Rebuild requested over HTTP"
    );
    Ok(Json(response))
}
