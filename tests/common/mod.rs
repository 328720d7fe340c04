//! Shared test fixtures.

#![allow(dead_code)]

pub mod mocks;

use mocks::{StaticFetcher, StubEmbedder};
use ragbench::rag::fetch::ContentFetcher;
use ragbench::utils::toml_config::RagBenchConfig;
use ragbench::{DocumentStore, Embedder, FileDocumentStore, RagService};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

/// Configuration with every path inside `dir`.
pub fn test_config(dir: &Path) -> RagBenchConfig {
    let mut config = RagBenchConfig::default();
    config.storage.index_path = dir.join("vectors").join("test.index");
    config.storage.documents_path = dir.join("documents");
    config
}

/// A service over a temp directory, with handles to its test doubles.
pub struct TestEnv {
    pub dir: TempDir,
    pub embedder: Arc<StubEmbedder>,
    pub service: Arc<RagService>,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = test_config(dir.path());
        Self::with_config(dir, config, Arc::new(StubEmbedder::new())).await
    }

    pub async fn with_config(dir: TempDir, config: RagBenchConfig, embedder: Arc<StubEmbedder>) -> Self {
        let service = open_service(config, embedder.clone(), Arc::new(StaticFetcher::default()))
            .await
            .expect("service opens");
        Self {
            dir,
            embedder,
            service: Arc::new(service),
        }
    }

    /// Open a second service over the same directory, as after a restart.
    pub async fn reopen(&self, embedder: Arc<StubEmbedder>) -> ragbench::Result<RagService> {
        open_service(
            test_config(self.dir.path()),
            embedder,
            Arc::new(StaticFetcher::default()),
        )
        .await
    }
}

pub async fn open_service(
    config: RagBenchConfig,
    embedder: Arc<StubEmbedder>,
    fetcher: Arc<dyn ContentFetcher>,
) -> ragbench::Result<RagService> {
    let store: Arc<dyn DocumentStore> =
        Arc::new(FileDocumentStore::open(&config.storage.documents_path).await?);
    let embedder: Arc<dyn Embedder> = embedder;
    RagService::with_components(Arc::new(config), embedder, store, fetcher).await
}
