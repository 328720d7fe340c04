use crate::api::handlers::{documents, rag, system};
use crate::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health))
        .route("/status", get(system::status))
        .route("/ingest", post(rag::ingest))
        .route("/query", get(rag::query).post(rag::query_json))
        .route("/documents", get(documents::list_documents))
        .route("/documents/{id}", get(documents::get_document))
        .route("/admin/rebuild", post(system::rebuild))
}
