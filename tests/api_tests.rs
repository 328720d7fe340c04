mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use common::mocks::{StaticFetcher, StubEmbedder};
use common::{open_service, test_config, TestEnv};
use ragbench::types::{
    DocumentDetail, DocumentListResponse, IngestResponse, QueryResponse, RebuildResponse,
    StatusResponse,
};
use ragbench::{build_router, AppState, EmbeddingError};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

// ============= Test Helpers =============

fn create_test_server(env: &TestEnv) -> TestServer {
    let app = build_router(AppState::new(env.service.clone()));
    TestServer::new(app).expect("Failed to create test server")
}

async fn ingest(server: &TestServer, body: Value) -> IngestResponse {
    let response = server.post("/ingest").json(&body).await;
    response.assert_status_ok();
    response.json()
}

async fn status(server: &TestServer) -> StatusResponse {
    let response = server.get("/status").await;
    response.assert_status_ok();
    response.json()
}

// ============= Health & Status =============

#[tokio::test]
async fn test_health_check() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_status_on_empty_service() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let status = status(&server).await;
    assert_eq!(status.status, "running");
    assert_eq!(status.vector_store_size, 0);
    assert_eq!(status.document_count, 0);
    assert!(status.last_ingest_timestamp.is_none());
    assert_eq!(status.embedding_model, "stub-embedder");
    assert_eq!(status.embedding_dimension, Some(4));
    assert_eq!(status.index_algorithm, "flat");
    assert_eq!(status.chunk_size, 1000);
    assert_eq!(status.chunk_overlap, 200);
}

// ============= Ingestion =============

#[tokio::test]
async fn test_ingest_chunks_with_character_windows() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let ingested = ingest(
        &server,
        json!({ "content": "AAA BBB CCC DDD", "chunk_size": 7, "chunk_overlap": 2 }),
    )
    .await;
    assert_eq!(ingested.status, "success");
    assert_eq!(ingested.chunks, 3);
    assert_eq!(ingested.vector_store_size, 3);

    let detail: DocumentDetail = server
        .get(&format!("/documents/{}", ingested.document_id))
        .await
        .json();
    let texts: Vec<&str> = detail.chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["AAA BBB", "BB CCC ", "C DDD"]);

    let status = status(&server).await;
    assert_eq!(status.vector_store_size, 3);
    assert_eq!(status.document_count, 1);
    assert!(status.last_ingest_timestamp.is_some());
}

#[tokio::test]
async fn test_reingesting_same_content_replaces_chunks() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);
    let body = json!({
        "content": "rust ownership and borrowing",
        "metadata": { "title": "Ownership" },
        "chunk_size": 10,
        "chunk_overlap": 2
    });

    let first = ingest(&server, body.clone()).await;
    let second = ingest(&server, body).await;

    assert_eq!(first.document_id, second.document_id);
    assert_eq!(first.vector_store_size, second.vector_store_size);
    assert_eq!(status(&server).await.document_count, 1);
}

#[tokio::test]
async fn test_invalid_chunk_size_leaves_state_unchanged() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);
    ingest(&server, json!({ "content": "rust" })).await;

    let response = server
        .post("/ingest")
        .json(&json!({ "content": "python", "chunk_size": 0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["kind"], "config_error");

    let response = server
        .post("/ingest")
        .json(&json!({ "content": "python", "chunk_size": 10, "chunk_overlap": 10 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let status = status(&server).await;
    assert_eq!(status.vector_store_size, 1);
    assert_eq!(status.document_count, 1);
}

#[tokio::test]
async fn test_ingest_requires_exactly_one_source() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    for body in [
        json!({}),
        json!({ "content": "text", "url": "https://example.com" }),
        json!({ "content": "   " }),
    ] {
        let response = server.post("/ingest").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["kind"], "invalid_input");
    }
}

#[tokio::test]
async fn test_embedding_timeout_fails_ingest_without_writes() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);
    ingest(&server, json!({ "content": "music" })).await;

    env.embedder
        .fail_with(EmbeddingError::Timeout(std::time::Duration::from_secs(30)));
    let response = server
        .post("/ingest")
        .json(&json!({ "content": "ocean waves" }))
        .await;
    response.assert_status(StatusCode::GATEWAY_TIMEOUT);
    let body: Value = response.json();
    assert_eq!(body["kind"], "embedding_timeout");

    env.embedder.recover();
    let status = status(&server).await;
    assert_eq!(status.vector_store_size, 1);
    assert_eq!(status.document_count, 1);
}

#[tokio::test]
async fn test_ingest_with_explicit_id_and_normalize() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let ingested = ingest(
        &server,
        json!({
            "content": "<p>Rust   is\n\nfast</p>",
            "document_id": "rust-intro",
            "source_type": "wiki",
            "normalize": true
        }),
    )
    .await;
    assert_eq!(ingested.document_id, "rust-intro");

    let detail: DocumentDetail = server.get("/documents/rust-intro").await.json();
    assert_eq!(detail.chunks[0].text, "Rust is fast");
    assert_eq!(detail.document.source_type.as_str(), "wiki");

    let response = server
        .post("/ingest")
        .json(&json!({ "content": "x", "document_id": "../escape" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_url_ingestion_uses_fetched_text_and_title() {
    let dir = TempDir::new().unwrap();
    let fetcher = StaticFetcher {
        title: Some("Ocean Facts".to_string()),
        text: "the ocean covers most of the planet".to_string(),
    };
    let service = open_service(
        test_config(dir.path()),
        Arc::new(StubEmbedder::new()),
        Arc::new(fetcher),
    )
    .await
    .unwrap();
    let server = TestServer::new(build_router(AppState::new(Arc::new(service)))).unwrap();

    let ingested = ingest(&server, json!({ "url": "https://example.com/ocean" })).await;
    assert!(ingested.document_id.starts_with("url_"));

    let listed: DocumentListResponse = server.get("/documents").await.json();
    assert_eq!(listed.total, 1);
    assert_eq!(listed.documents[0].title.as_deref(), Some("Ocean Facts"));

    let detail: DocumentDetail = server
        .get(&format!("/documents/{}", ingested.document_id))
        .await
        .json();
    assert_eq!(
        detail.document.metadata["url"].as_str(),
        Some("https://example.com/ocean")
    );
}

#[tokio::test]
async fn test_unreachable_url_is_bad_gateway() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let response = server
        .post("/ingest")
        .json(&json!({ "url": "https://unreachable.invalid" }))
        .await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(status(&server).await.vector_store_size, 0);
}

// ============= Query =============

#[tokio::test]
async fn test_query_empty_index_returns_no_results() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let response = server.get("/query").add_query_param("q", "anything").await;
    response.assert_status_ok();
    let body: QueryResponse = response.json();
    assert!(body.results.is_empty());
    assert_eq!(body.total_results, 0);
    assert!(body.error.is_none());
    assert_eq!(env.embedder.calls(), 0);
}

#[tokio::test]
async fn test_query_top1_picks_most_similar_document() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let rust = ingest(&server, json!({ "content": "rust rust rust" })).await;
    let python = ingest(&server, json!({ "content": "python python" })).await;
    assert_ne!(rust.document_id, python.document_id);

    let response = server
        .get("/query")
        .add_query_param("q", "rust programming")
        .add_query_param("top_k", 1)
        .await;
    response.assert_status_ok();
    let body: QueryResponse = response.json();
    assert_eq!(body.total_results, 1);
    assert_eq!(body.results[0].document_id, rust.document_id);
    assert_eq!(body.results[0].content, "rust rust rust");
    assert_eq!(body.query, "rust programming");
}

#[tokio::test]
async fn test_query_returns_fewer_than_top_k_when_index_is_small() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let ingested = ingest(
        &server,
        json!({ "content": "rust and python and ocean", "chunk_size": 10, "chunk_overlap": 0 }),
    )
    .await;
    assert_eq!(ingested.chunks, 3);

    let response = server
        .post("/query")
        .json(&json!({ "query": "rust", "top_k": 5 }))
        .await;
    response.assert_status_ok();
    let body: QueryResponse = response.json();
    assert_eq!(body.total_results, 3);
    assert!(body
        .results
        .windows(2)
        .all(|w| w[0].similarity >= w[1].similarity));
}

#[tokio::test]
async fn test_query_threshold_filters_results() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);
    ingest(&server, json!({ "content": "rust" })).await;
    ingest(&server, json!({ "content": "music" })).await;

    let body: QueryResponse = server
        .post("/query")
        .json(&json!({ "q": "rust", "top_k": 5, "threshold": 0.5 }))
        .await
        .json();
    assert_eq!(body.total_results, 1);
    assert!(body.results.iter().all(|r| r.similarity >= 0.5));
}

#[tokio::test]
async fn test_query_backend_failure_reports_error_field() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);
    ingest(&server, json!({ "content": "rust" })).await;

    env.embedder
        .fail_with(EmbeddingError::Unavailable("connection refused".to_string()));
    let response = server.get("/query").add_query_param("q", "rust").await;
    response.assert_status_ok();
    let body: QueryResponse = response.json();
    assert!(body.results.is_empty());
    assert!(body.error.is_some());
}

#[tokio::test]
async fn test_query_rejects_zero_top_k() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let response = server
        .get("/query")
        .add_query_param("q", "rust")
        .add_query_param("top_k", 0)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============= Documents & Maintenance =============

#[tokio::test]
async fn test_unknown_document_is_not_found() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);

    let response = server.get("/documents/text_missing").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_admin_rebuild_keeps_index_size() {
    let env = TestEnv::new().await;
    let server = create_test_server(&env);
    ingest(&server, json!({ "content": "rust", "metadata": { "n": 1 } })).await;
    ingest(
        &server,
        json!({ "content": "ocean music", "chunk_size": 5, "chunk_overlap": 1 }),
    )
    .await;
    let before = status(&server).await.vector_store_size;

    let response = server.post("/admin/rebuild").await;
    response.assert_status_ok();
    let rebuilt: RebuildResponse = response.json();
    assert_eq!(rebuilt.documents, 2);
    assert_eq!(rebuilt.vector_store_size, before);
    assert_eq!(rebuilt.reembedded, 0);
}
