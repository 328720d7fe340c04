//! Ingestion pipeline: chunk, embed, store, index, persist.
//!
//! Everything that can be rejected (chunk parameters, ids, embedding) is
//! checked before the first write. The write phase runs under a single
//! writer lock in a fixed order:
//!
//! 1. DocumentStore (source of truth, includes chunk embeddings)
//! 2. VectorIndex (in memory)
//! 3. VectorIndex persist
//!
//! A failure in step 1 or 3 surfaces as [`AppError::Ingestion`]. Whatever
//! state it leaves behind, [`IngestionPipeline::rebuild_index`] can
//! reconstruct the index from the store alone.

use super::chunker::{chunk_text, validate_params};
use super::embeddings::{verify_batch, Embedder};
use crate::db::{validate_document_id, DocumentStore};
use crate::types::{AppError, Chunk, Document, Metadata, Result, SourceType};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use ragbench_vector::{IndexEntry, VectorIndex};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

const FIELD_SEPARATOR: u8 = 0x1F;

/// Per-call ingestion parameters.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source_type: SourceType,
    /// Overrides the content-derived id.
    pub document_id: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl IngestOptions {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            source_type: SourceType::Text,
            document_id: None,
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub document_id: String,
    pub chunks: usize,
    /// Index entries dropped because the id already existed.
    pub replaced: usize,
    pub vector_store_size: usize,
}

/// Result of comparing the index with the document store.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub index_entries: usize,
    pub stored_chunks: usize,
    /// Stored documents whose chunks are absent from the index or counted differently.
    pub missing: Vec<String>,
    /// Indexed documents the store does not know.
    pub orphaned: Vec<String>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RebuildReport {
    pub documents: usize,
    pub entries: usize,
    /// Documents whose stored embeddings were not reusable.
    pub reembedded: usize,
}

/// Deterministic document id.
///
/// `"<source_type>_"` followed by the first 32 hex digits of
/// SHA-256(source_type, content, canonical metadata JSON), fields separated
/// by 0x1F. Identical content and metadata always map to the same id.
pub fn compute_document_id(source_type: SourceType, content: &str, metadata: &Metadata) -> String {
    let canonical = serde_json::to_string(metadata).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(source_type.as_str().as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(content.as_bytes());
    hasher.update([FIELD_SEPARATOR]);
    hasher.update(canonical.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}_{}", source_type.as_str(), &digest[..32])
}

pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
    index_path: PathBuf,
    writer: Mutex<()>,
    last_ingest: RwLock<Option<DateTime<Utc>>>,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        index: Arc<VectorIndex>,
        index_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder,
            store,
            index,
            index_path: index_path.into(),
            writer: Mutex::new(()),
            last_ingest: RwLock::new(None),
        }
    }

    /// Time of the last successful ingestion in this process.
    pub fn last_ingest(&self) -> Option<DateTime<Utc>> {
        *self.last_ingest.read()
    }

    /// Ingest `raw_text` as one document and return where it landed.
    ///
    /// Re-ingesting the same id replaces the document's chunks instead of
    /// appending to them.
    pub async fn ingest(
        &self,
        raw_text: &str,
        metadata: Metadata,
        options: IngestOptions,
    ) -> Result<IngestOutcome> {
        let start = Instant::now();
        validate_params(options.chunk_size, options.chunk_overlap)?;
        let document_id = match options.document_id {
            Some(id) => {
                validate_document_id(&id)?;
                id
            }
            None => compute_document_id(options.source_type, raw_text, &metadata),
        };

        let texts = chunk_text(raw_text, options.chunk_size, options.chunk_overlap)?;
        if texts.is_empty() {
            return Err(AppError::InvalidInput("content is empty".to_string()));
        }

        let dims = self.embedder.dimensions();
        let vectors = self.embedder.embed(&texts).await?;
        verify_batch(&vectors, texts.len(), dims)?;
        if let Some(expected) = self.index.dimension() {
            if expected != dims {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: dims,
                });
            }
        }

        let document = Document {
            id: document_id.clone(),
            source_type: options.source_type,
            metadata,
            ingested_at: Utc::now(),
        };
        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(vectors.iter().cloned())
            .enumerate()
            .map(|(chunk_index, (text, embedding))| Chunk {
                document_id: document_id.clone(),
                chunk_index,
                text,
                embedding,
            })
            .collect();
        let chunk_count = chunks.len();

        let _writer = self.writer.lock().await;
        self.store
            .put_with_chunks(document, chunks, Some(self.embedder.model_name()))
            .await
            .map_err(|e| AppError::ingestion("writing documents", e))?;
        let replaced = self.index.replace_document(&document_id, vectors)?;
        self.index
            .persist(&self.index_path)
            .await
            .map_err(|e| AppError::ingestion("persisting index", e))?;
        *self.last_ingest.write() = Some(Utc::now());

        let vector_store_size = self.index.len();
        info!(
            document_id = %document_id,
            chunks = chunk_count,
            replaced,
            vector_store_size,
            duration_ms = start.elapsed().as_millis() as u64,
            "Document ingested"
        );

        Ok(IngestOutcome {
            document_id,
            chunks: chunk_count,
            replaced,
            vector_store_size,
        })
    }

    /// Compare per-document chunk counts in the index and the store.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let indexed = self.index.document_chunk_counts();
        let stored = self.store.list().await?;

        let mut report = ReconcileReport {
            index_entries: indexed.values().sum(),
            stored_chunks: stored.iter().map(|d| d.chunks).sum(),
            ..Default::default()
        };
        let mut known = BTreeSet::new();
        for summary in &stored {
            known.insert(summary.id.as_str());
            let in_index = indexed.get(&summary.id).copied().unwrap_or(0);
            if in_index != summary.chunks {
                report.missing.push(summary.id.clone());
            }
        }
        report.orphaned = indexed
            .keys()
            .filter(|id| !known.contains(id.as_str()))
            .cloned()
            .collect();

        if !report.is_consistent() {
            warn!(
                index_entries = report.index_entries,
                stored_chunks = report.stored_chunks,
                missing = report.missing.len(),
                orphaned = report.orphaned.len(),
                "Vector index out of sync with document store"
            );
        }
        Ok(report)
    }

    /// Rebuild the whole index from the document store and persist it.
    ///
    /// Stored chunk embeddings are reused when they came from the current
    /// embedding model with the current dimension; otherwise the chunk texts
    /// are re-embedded and the store is updated with the new vectors.
    pub async fn rebuild_index(&self) -> Result<RebuildReport> {
        let start = Instant::now();
        let _writer = self.writer.lock().await;
        let model = self.embedder.model_name().to_string();
        let dims = self.embedder.dimensions();

        let mut report = RebuildReport::default();
        let mut entries = Vec::new();
        for summary in self.store.list().await? {
            let mut chunks = self.store.get_chunks(&summary.id).await?;
            let stored_model = self.store.embedding_model(&summary.id).await?;
            let reusable = stored_model.as_deref() == Some(model.as_str())
                && chunks.iter().all(|c| c.embedding.len() == dims);

            if !reusable {
                let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
                let vectors = self.embedder.embed(&texts).await?;
                verify_batch(&vectors, texts.len(), dims)?;
                for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                    chunk.embedding = vector;
                }
                let document = self.store.get(&summary.id).await?;
                self.store
                    .put_with_chunks(document, chunks.clone(), Some(&model))
                    .await
                    .map_err(|e| AppError::ingestion("writing documents", e))?;
                report.reembedded += 1;
            }

            entries.extend(
                chunks
                    .into_iter()
                    .map(|c| IndexEntry::new(c.embedding, c.document_id, c.chunk_index)),
            );
            report.documents += 1;
        }

        report.entries = entries.len();
        self.index.rebuild(entries, Some(model))?;
        self.index
            .persist(&self.index_path)
            .await
            .map_err(|e| AppError::ingestion("persisting index", e))?;

        info!(
            documents = report.documents,
            entries = report.entries,
            reembedded = report.reembedded,
            duration_ms = start.elapsed().as_millis() as u64,
            "Rebuilt vector index from document store"
        );
        Ok(report)
    }

    /// Write the index to its configured path.
    pub async fn persist(&self) -> Result<()> {
        let _writer = self.writer.lock().await;
        self.index
            .persist(&self.index_path)
            .await
            .map_err(|e| AppError::ingestion("persisting index", e))
    }
}
