//! Query-side retrieval: embed, search, resolve.

use super::embeddings::Embedder;
use crate::db::DocumentStore;
use crate::types::{AppError, Metadata, Result};
use ragbench_vector::VectorIndex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One resolved search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        index: Arc<VectorIndex>,
    ) -> Self {
        Self {
            embedder,
            store,
            index,
        }
    }

    /// Top `top_k` chunks for `text` with score ≥ `threshold`, best first.
    ///
    /// An empty index returns no results without calling the embedder. Hits
    /// whose document or chunk is missing from the store are logged and
    /// skipped.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        threshold: f32,
    ) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 {
            return Err(AppError::InvalidInput("top_k must be > 0".to_string()));
        }
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput("query text is empty".to_string()));
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(text).await?;
        let hits = self.index.search(&query_vector, top_k, threshold)?;
        debug!(hits = hits.len(), top_k, threshold, "Vector search complete");

        let mut metadata_cache: HashMap<String, Option<Metadata>> = HashMap::new();
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            if !metadata_cache.contains_key(&hit.document_id) {
                let metadata = match self.store.get(&hit.document_id).await {
                    Ok(document) => Some(document.metadata),
                    Err(AppError::NotFound(_)) => None,
                    Err(e) => return Err(e),
                };
                metadata_cache.insert(hit.document_id.clone(), metadata);
            }
            let Some(Some(metadata)) = metadata_cache.get(&hit.document_id) else {
                warn!(document_id = %hit.document_id, "Indexed document missing from store, skipping hit");
                continue;
            };

            let text = match self
                .store
                .get_chunk_text(&hit.document_id, hit.chunk_index)
                .await
            {
                Ok(text) => text,
                Err(AppError::NotFound(_)) => {
                    warn!(
                        document_id = %hit.document_id,
                        chunk_index = hit.chunk_index,
                        "Indexed chunk missing from store, skipping hit"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            results.push(RetrievedChunk {
                document_id: hit.document_id,
                chunk_index: hit.chunk_index,
                text,
                metadata: metadata.clone(),
                score: hit.score,
            });
        }
        Ok(results)
    }
}
