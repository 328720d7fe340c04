//! The retrieval service: the components wired together behind the three
//! operations callers see (`ingest`, `query`, `status`) plus document
//! browsing and index maintenance.
//!
//! All components are built once in [`RagService::open`] from a single
//! [`RagBenchConfig`] and shared by reference afterwards.

use super::chunker::{clean_text, validate_params};
use super::embeddings::{create_embedder, Embedder};
use super::fetch::{ContentFetcher, HttpFetcher};
use super::ingest::{IngestOptions, IngestionPipeline, RebuildReport, ReconcileReport};
use super::retriever::Retriever;
use crate::db::{DocumentStore, FileDocumentStore};
use crate::types::{
    AppError, ChunkView, DocumentDetail, DocumentListResponse, IngestRequest, IngestResponse,
    MetadataValue, QueryRequest, QueryResponse, QueryResultItem, RebuildResponse, Result,
    SourceType, StatusResponse,
};
use crate::utils::toml_config::{RagBenchConfig, RecoveryPolicy};
use ragbench_vector::{IndexConfig, VectorIndex};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct RagService {
    config: Arc<RagBenchConfig>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
    fetcher: Arc<dyn ContentFetcher>,
    pipeline: IngestionPipeline,
    retriever: Retriever,
}

impl RagService {
    /// Build every component from configuration.
    pub async fn open(config: Arc<RagBenchConfig>) -> Result<Self> {
        let embedder = create_embedder(&config)?;
        let store: Arc<dyn DocumentStore> =
            Arc::new(FileDocumentStore::open(&config.storage.documents_path).await?);
        let fetcher: Arc<dyn ContentFetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
        Self::with_components(config, embedder, store, fetcher).await
    }

    /// Build the service around caller-supplied components.
    ///
    /// Loads the persisted index if there is one and applies the
    /// `[index]` recovery policies when it does not match the embedder or
    /// the document store.
    pub async fn with_components(
        config: Arc<RagBenchConfig>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Result<Self> {
        let index_config = IndexConfig {
            algorithm: config.index.algorithm,
            dimension: Some(embedder.dimensions()),
            hnsw: config.index.hnsw.clone(),
            embedding_model: Some(embedder.model_name().to_string()),
        };
        let (index, needs_rebuild) =
            open_index(&config, index_config, embedder.model_name()).await?;
        let index = Arc::new(index);

        let pipeline = IngestionPipeline::new(
            embedder.clone(),
            store.clone(),
            index.clone(),
            config.storage.index_path.clone(),
        );
        let retriever = Retriever::new(embedder.clone(), store.clone(), index.clone());

        let service = Self {
            config,
            embedder,
            store,
            index,
            fetcher,
            pipeline,
            retriever,
        };

        if needs_rebuild {
            service.pipeline.rebuild_index().await?;
        } else {
            let report = service.pipeline.reconcile().await?;
            if !report.is_consistent()
                && service.config.index.on_startup_mismatch == RecoveryPolicy::Rebuild
            {
                service.pipeline.rebuild_index().await?;
            }
        }

        info!(
            vector_store_size = service.index.len(),
            algorithm = %service.index.algorithm(),
            model = service.embedder.model_name(),
            "Retrieval service ready"
        );
        Ok(service)
    }

    pub fn config(&self) -> &Arc<RagBenchConfig> {
        &self.config
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &IngestionPipeline {
        &self.pipeline
    }

    // ============= Ingest =============

    /// Ingest a request carrying either `content` or a `url` to fetch.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        let chunk_size = request.chunk_size.unwrap_or(self.config.rag.chunk_size);
        let chunk_overlap = request
            .chunk_overlap
            .unwrap_or(self.config.rag.chunk_overlap);
        validate_params(chunk_size, chunk_overlap)?;

        let mut metadata = request.metadata;
        let (text, default_source) = match (request.content, request.url) {
            (Some(content), None) => {
                let text = if request.normalize {
                    clean_text(&content)
                } else {
                    content
                };
                (text, SourceType::Text)
            }
            (None, Some(url)) => {
                let fetched = self.fetcher.fetch(&url).await?;
                if let Some(title) = fetched.title {
                    metadata
                        .entry("title".to_string())
                        .or_insert(MetadataValue::String(title));
                }
                metadata
                    .entry("url".to_string())
                    .or_insert(MetadataValue::String(fetched.url));
                (fetched.text, SourceType::Url)
            }
            _ => {
                return Err(AppError::InvalidInput(
                    "exactly one of `content` and `url` is required".to_string(),
                ))
            }
        };
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("content is empty".to_string()));
        }

        let mut options = IngestOptions::new(chunk_size, chunk_overlap)
            .with_source_type(request.source_type.unwrap_or(default_source));
        if let Some(id) = request.document_id {
            options = options.with_document_id(id);
        }

        let outcome = self.pipeline.ingest(&text, metadata, options).await?;
        Ok(IngestResponse {
            status: "success".to_string(),
            document_id: outcome.document_id,
            chunks: outcome.chunks,
            vector_store_size: outcome.vector_store_size,
        })
    }

    // ============= Query =============

    /// Run a query.
    ///
    /// Malformed requests (empty text, `top_k == 0`) are rejected. Failures
    /// while answering a well-formed request are reported in the response's
    /// `error` field with an empty result list.
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        let start = Instant::now();
        let rag = &self.config.rag;
        let top_k = request.top_k.unwrap_or(rag.default_top_k);
        if top_k == 0 {
            return Err(AppError::InvalidInput("top_k must be > 0".to_string()));
        }
        let top_k = top_k.min(rag.max_top_k);
        let threshold = request.threshold.unwrap_or(rag.default_threshold);
        if !threshold.is_finite() {
            return Err(AppError::InvalidInput("threshold must be a finite number".to_string()));
        }
        if request.query.trim().is_empty() {
            return Err(AppError::InvalidInput("query text is empty".to_string()));
        }

        let (results, error) = match self.retriever.query(&request.query, top_k, threshold).await {
            Ok(chunks) => (
                chunks
                    .into_iter()
                    .map(|c| QueryResultItem {
                        document_id: c.document_id,
                        chunk_index: c.chunk_index,
                        content: c.text,
                        metadata: c.metadata,
                        similarity: c.score,
                    })
                    .collect::<Vec<_>>(),
                None,
            ),
            Err(e) => {
                error!(error = %e, kind = e.kind(), "Query failed");
                (Vec::new(), Some(e.to_string()))
            }
        };

        let query_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            top_k,
            threshold,
            results = results.len(),
            duration_ms = query_time_ms as u64,
            "Query answered"
        );
        Ok(QueryResponse {
            query: request.query,
            total_results: results.len(),
            results,
            query_time_ms,
            error,
        })
    }

    // ============= Status & Documents =============

    pub async fn status(&self) -> Result<StatusResponse> {
        let stats = self.index.stats();
        Ok(StatusResponse {
            status: "running".to_string(),
            vector_store_size: stats.entries,
            document_count: self.store.count().await?,
            last_ingest_timestamp: self.pipeline.last_ingest(),
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dimension: stats.dimension.or(Some(self.embedder.dimensions())),
            index_algorithm: stats.algorithm.to_string(),
            chunk_size: self.config.rag.chunk_size,
            chunk_overlap: self.config.rag.chunk_overlap,
        })
    }

    pub async fn list_documents(&self) -> Result<DocumentListResponse> {
        let documents = self.store.list().await?;
        Ok(DocumentListResponse {
            total: documents.len(),
            documents,
        })
    }

    pub async fn document(&self, document_id: &str) -> Result<DocumentDetail> {
        let document = self.store.get(document_id).await?;
        let chunks = self
            .store
            .get_chunks(document_id)
            .await?
            .into_iter()
            .map(|c| ChunkView {
                chunk_index: c.chunk_index,
                text: c.text,
            })
            .collect();
        Ok(DocumentDetail { document, chunks })
    }

    // ============= Maintenance =============

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.pipeline.reconcile().await
    }

    pub async fn rebuild(&self) -> Result<RebuildResponse> {
        let RebuildReport {
            documents,
            entries,
            reembedded,
        } = self.pipeline.rebuild_index().await?;
        Ok(RebuildResponse {
            status: "rebuilt".to_string(),
            documents,
            vector_store_size: entries,
            reembedded,
        })
    }

    /// Final persist before the process exits.
    pub async fn shutdown(&self) -> Result<()> {
        self.pipeline.persist().await?;
        info!(vector_store_size = self.index.len(), "Vector index persisted on shutdown");
        Ok(())
    }
}

/// Load the persisted index, or start empty. The flag asks for a rebuild
/// from the document store.
async fn open_index(
    config: &RagBenchConfig,
    index_config: IndexConfig,
    model: &str,
) -> Result<(VectorIndex, bool)> {
    let path = &config.storage.index_path;
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|e| AppError::Storage(format!("checking {}: {}", path.display(), e)))?;
    if !exists {
        info!(path = %path.display(), "No persisted vector index, starting empty");
        return Ok((VectorIndex::new(index_config)?, false));
    }

    let mismatch = |reason: String| -> Result<(VectorIndex, bool)> {
        match config.index.on_startup_mismatch {
            RecoveryPolicy::Rebuild => {
                warn!(reason = %reason, "Persisted index does not match the embedder, rebuilding");
                Ok((VectorIndex::new(index_config.clone())?, true))
            }
            RecoveryPolicy::Fail => Err(AppError::Config(format!(
                "{}; run `ragbench-server rebuild` or set index.on_startup_mismatch = \"rebuild\"",
                reason
            ))),
        }
    };

    match VectorIndex::load(path, index_config.clone()).await {
        Ok(index) => match index.embedding_model() {
            Some(stored) if stored != model => mismatch(format!(
                "index was built with model '{}', configured model is '{}'",
                stored, model
            )),
            _ => Ok((index, false)),
        },
        Err(ragbench_vector::Error::DimensionMismatch { expected, actual }) => match config
            .index
            .on_startup_mismatch
        {
            RecoveryPolicy::Fail => Err(AppError::DimensionMismatch { expected, actual }),
            RecoveryPolicy::Rebuild => mismatch(format!(
                "index has dimension {}, embedder produces {}",
                actual, expected
            )),
        },
        Err(ragbench_vector::Error::CorruptIndex(reason)) => match config.index.on_corrupt {
            RecoveryPolicy::Rebuild => {
                warn!(reason = %reason, "Persisted index is corrupt, rebuilding from document store");
                Ok((VectorIndex::new(index_config.clone())?, true))
            }
            RecoveryPolicy::Fail => Err(AppError::CorruptIndex(reason)),
        },
        Err(e) => Err(e.into()),
    }
}
