//! Ingestion, persistence and recovery across service restarts.

mod common;

use common::mocks::{FailingStore, StaticFetcher, StubEmbedder};
use common::{open_service, test_config, TestEnv};
use ragbench::rag::retriever::Retriever;
use ragbench::types::{AppError, IngestRequest, QueryRequest};
use ragbench::utils::toml_config::RecoveryPolicy;
use ragbench::{DocumentStore, Embedder, FileDocumentStore, RagService};
use ragbench_vector::{IndexConfig, IndexEntry, VectorIndex};
use std::sync::Arc;
use tempfile::TempDir;

fn content(text: &str) -> IngestRequest {
    IngestRequest {
        content: Some(text.to_string()),
        ..Default::default()
    }
}

fn chunked(text: &str, chunk_size: usize, chunk_overlap: usize) -> IngestRequest {
    IngestRequest {
        chunk_size: Some(chunk_size),
        chunk_overlap: Some(chunk_overlap),
        ..content(text)
    }
}

fn query(text: &str, top_k: usize) -> QueryRequest {
    QueryRequest {
        query: text.to_string(),
        top_k: Some(top_k),
        threshold: None,
    }
}

async fn seed(env: &TestEnv) -> usize {
    env.service
        .ingest(chunked("rust ownership rules", 8, 2))
        .await
        .unwrap();
    env.service
        .ingest(content("ocean currents and tides"))
        .await
        .unwrap()
        .vector_store_size
}

// ============= Persistence =============

#[tokio::test]
async fn test_index_survives_restart() {
    let env = TestEnv::new().await;
    let size = seed(&env).await;
    env.service.shutdown().await.unwrap();
    assert!(env.dir.path().join("vectors/test.index").exists());

    let embedder = Arc::new(StubEmbedder::new());
    let reopened = env.reopen(embedder.clone()).await.unwrap();
    assert_eq!(reopened.index().len(), size);
    assert!(reopened.reconcile().await.unwrap().is_consistent());
    // Loaded from disk, not rebuilt.
    assert_eq!(embedder.calls(), 0);

    let response = reopened.query(query("ocean", 1)).await.unwrap();
    assert_eq!(response.results[0].content, "ocean currents and tides");
}

#[tokio::test]
async fn test_deleted_index_is_rebuilt_from_documents() {
    let env = TestEnv::new().await;
    let size = seed(&env).await;
    std::fs::remove_file(env.dir.path().join("vectors/test.index")).unwrap();

    let reopened = env.reopen(Arc::new(StubEmbedder::new())).await.unwrap();
    assert_eq!(reopened.index().len(), size);
    assert!(reopened.reconcile().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_corrupt_index_fails_by_default() {
    let env = TestEnv::new().await;
    seed(&env).await;
    std::fs::write(env.dir.path().join("vectors/test.index"), b"not an index").unwrap();

    let result = env.reopen(Arc::new(StubEmbedder::new())).await;
    assert!(matches!(result, Err(AppError::CorruptIndex(_))));
}

#[tokio::test]
async fn test_corrupt_index_rebuilds_when_configured() {
    let env = TestEnv::new().await;
    let size = seed(&env).await;
    std::fs::write(env.dir.path().join("vectors/test.index"), b"not an index").unwrap();

    let mut config = test_config(env.dir.path());
    config.index.on_corrupt = RecoveryPolicy::Rebuild;
    let reopened = open_service(
        config,
        Arc::new(StubEmbedder::new()),
        Arc::new(StaticFetcher::default()),
    )
    .await
    .unwrap();
    assert_eq!(reopened.index().len(), size);
}

#[tokio::test]
async fn test_model_change_reembeds_stored_chunks() {
    let env = TestEnv::new().await;
    let size = seed(&env).await;

    let embedder = Arc::new(StubEmbedder::with_model("stub-embedder-v2"));
    let reopened = env.reopen(embedder.clone()).await.unwrap();
    assert_eq!(reopened.index().len(), size);
    assert_eq!(
        reopened.index().embedding_model().as_deref(),
        Some("stub-embedder-v2")
    );
    // One batch per stored document.
    assert_eq!(embedder.calls(), 2);

    let status = reopened.status().await.unwrap();
    assert_eq!(status.embedding_model, "stub-embedder-v2");
}

#[tokio::test]
async fn test_model_change_fails_under_strict_policy() {
    let env = TestEnv::new().await;
    seed(&env).await;

    let mut config = test_config(env.dir.path());
    config.index.on_startup_mismatch = RecoveryPolicy::Fail;
    let result = open_service(
        config,
        Arc::new(StubEmbedder::with_model("other-model")),
        Arc::new(StaticFetcher::default()),
    )
    .await;
    assert!(matches!(result, Err(AppError::Config(_))));
}

// ============= Failure Atomicity =============

#[tokio::test]
async fn test_store_failure_leaves_index_untouched() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let embedder: Arc<dyn Embedder> = Arc::new(StubEmbedder::new());
    let store: Arc<dyn DocumentStore> = Arc::new(FailingStore);
    let service = RagService::with_components(
        Arc::new(config),
        embedder,
        store,
        Arc::new(StaticFetcher::default()),
    )
    .await
    .unwrap();

    let err = service.ingest(content("rust")).await.unwrap_err();
    assert_eq!(err.kind(), "ingestion_error");
    assert!(service.index().is_empty());
    assert!(service.status().await.unwrap().last_ingest_timestamp.is_none());
}

#[tokio::test]
async fn test_embedding_failure_writes_nothing() {
    let env = TestEnv::new().await;
    env.embedder.fail_with(ragbench::EmbeddingError::RateLimited {
        retry_after: None,
    });

    let err = env.service.ingest(content("music theory")).await.unwrap_err();
    assert_eq!(err.kind(), "embedding_rate_limited");
    assert!(env.service.index().is_empty());
    assert_eq!(env.service.list_documents().await.unwrap().total, 0);
}

// ============= Retrieval =============

#[tokio::test]
async fn test_retriever_skips_hits_missing_from_store() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileDocumentStore::open(dir.path()).await.unwrap());
    let embedder = Arc::new(StubEmbedder::new());
    let index = Arc::new(VectorIndex::new(IndexConfig::flat().with_dimension(4)).unwrap());
    index
        .add(vec![IndexEntry::new(
            StubEmbedder::vector_for("rust"),
            "text_ghost",
            0,
        )])
        .unwrap();

    let retriever = Retriever::new(embedder, store, index);
    let results = retriever.query("rust", 5, 0.0).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_retriever_threshold_and_ordering() {
    let env = TestEnv::new().await;
    env.service.ingest(content("rust rust python")).await.unwrap();
    env.service.ingest(content("rust")).await.unwrap();
    env.service.ingest(content("music")).await.unwrap();

    let response = env.service.query(query("rust", 10)).await.unwrap();
    assert_eq!(response.total_results, 3);
    assert_eq!(response.results[0].content, "rust");
    assert!(response
        .results
        .windows(2)
        .all(|w| w[0].similarity >= w[1].similarity));

    let filtered = env
        .service
        .query(QueryRequest {
            threshold: Some(0.8),
            ..query("rust", 10)
        })
        .await
        .unwrap();
    assert_eq!(filtered.total_results, 2);
}

#[tokio::test]
async fn test_top_k_is_clamped_to_configured_maximum() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.rag.max_top_k = 2;
    let env = TestEnv::with_config(dir, config, Arc::new(StubEmbedder::new())).await;
    env.service
        .ingest(chunked("rust python ocean music", 5, 0))
        .await
        .unwrap();

    let response = env.service.query(query("rust", 50)).await.unwrap();
    assert_eq!(response.total_results, 2);
}

// ============= Concurrency =============

#[tokio::test]
async fn test_concurrent_ingests_are_all_indexed() {
    let env = TestEnv::new().await;
    let topics = ["rust", "python", "ocean", "music"];

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = env.service.clone();
            let text = format!("{} note number {}", topics[i % topics.len()], i);
            tokio::spawn(async move { service.ingest(chunked(&text, 8, 2)).await })
        })
        .collect();

    let mut expected_entries = 0;
    for handle in handles {
        expected_entries += handle.await.unwrap().unwrap().chunks;
    }

    assert_eq!(env.service.index().len(), expected_entries);
    assert_eq!(env.service.list_documents().await.unwrap().total, 16);
    assert!(env.service.reconcile().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_query_during_ingest_sees_consistent_state() {
    let env = TestEnv::new().await;
    env.service.ingest(content("rust")).await.unwrap();

    let writer = {
        let service = env.service.clone();
        tokio::spawn(async move {
            for i in 0..10 {
                service
                    .ingest(content(&format!("python {}", i)))
                    .await
                    .unwrap();
            }
        })
    };
    for _ in 0..10 {
        let response = env.service.query(query("rust", 1)).await.unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.results[0].content, "rust");
    }
    writer.await.unwrap();
    assert_eq!(env.service.index().len(), 11);
}
