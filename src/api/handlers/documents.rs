//! Document browsing handlers.

use crate::{
    types::{DocumentDetail, DocumentListResponse, Result},
    AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};

/// List stored documents, oldest first.
#[utoipa::path(
    get,
    path = "/documents",
    responses(
        (status = 200, description = "Document summaries", body = DocumentListResponse)
    ),
    tag = "documents"
)]
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<DocumentListResponse>> {
    Ok(Json(state.rag.list_documents().await?))
}

/// Fetch one document with its chunk texts.
#[utoipa::path(
    get,
    path = "/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Document and chunks", body = DocumentDetail),
        (status = 404, description = "Unknown document id")
    ),
    tag = "documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>> {
    Ok(Json(state.rag.document(&id).await?))
}
