//! fastembed ONNX embeddings (feature `local-embeddings`).
//!
//! The model is loaded lazily on first use and shared process-wide; every
//! `LocalEmbedder` for the same model reuses one instance. Inference is
//! CPU-bound and runs on the blocking pool.

use super::embeddings::{verify_batch, Embedder, EmbeddingError};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

pub const DEFAULT_LOCAL_MODEL: &str = "BAAI/bge-small-en-v1.5";

static MODEL: OnceCell<(String, Arc<Mutex<TextEmbedding>>)> = OnceCell::const_new();

fn resolve_model(name: &str) -> Option<(EmbeddingModel, usize)> {
    match name {
        "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" | "bge-small" => {
            Some((EmbeddingModel::BGESmallENV15, 384))
        }
        "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
            Some((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" | "bge-base" => {
            Some((EmbeddingModel::BGEBaseENV15, 768))
        }
        _ => None,
    }
}

pub struct LocalEmbedder {
    name: String,
    model: EmbeddingModel,
    dims: usize,
}

impl LocalEmbedder {
    pub fn new(model_name: Option<&str>) -> Result<Self> {
        let name = model_name.unwrap_or(DEFAULT_LOCAL_MODEL);
        let (model, dims) = resolve_model(name)
            .ok_or_else(|| AppError::Config(format!("unknown local embedding model '{}'", name)))?;
        Ok(Self {
            name: name.to_string(),
            model,
            dims,
        })
    }

    async fn handle(&self) -> std::result::Result<Arc<Mutex<TextEmbedding>>, EmbeddingError> {
        let (loaded, handle) = MODEL
            .get_or_try_init(|| async {
                let model = self.model.clone();
                let name = self.name.clone();
                info!(model = %name, "Loading local embedding model");
                let embedding = tokio::task::spawn_blocking(move || {
                    TextEmbedding::try_new(InitOptions::new(model).with_show_download_progress(true))
                })
                .await
                .map_err(|e| EmbeddingError::Model(e.to_string()))?
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;
                Ok::<_, EmbeddingError>((name, Arc::new(Mutex::new(embedding))))
            })
            .await?;

        if loaded != &self.name {
            return Err(EmbeddingError::Model(format!(
                "model '{}' already loaded in this process, cannot load '{}'",
                loaded, self.name
            )));
        }
        Ok(handle.clone())
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let handle = self.handle().await?;
        let inputs = texts.to_vec();
        let vectors = tokio::task::spawn_blocking(move || handle.lock().embed(inputs, None))
            .await
            .map_err(|e| EmbeddingError::Model(e.to_string()))?
            .map_err(|e| EmbeddingError::Model(e.to_string()))?;
        verify_batch(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}
