//! OpenAI-compatible `/embeddings` client.
//!
//! Inputs are split into batches of `[embedding] batch_size`; each batch is
//! one POST. The first failing batch fails the whole call.

use super::embeddings::{verify_batch, Embedder, EmbeddingError};
use crate::types::{AppError, Result};
use crate::utils::toml_config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default model for the remote backend.
pub const DEFAULT_REMOTE_MODEL: &str = "text-embedding-3-small";

/// Dimensions of well-known hosted models, used when `dimensions` is not configured.
fn known_dimensions(model: &str) -> Option<usize> {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "nomic-embed-text" => Some(768),
        "mxbai-embed-large" => Some(1024),
        "all-minilm" => Some(384),
        _ => None,
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
    batch_size: usize,
    timeout: Duration,
}

impl RemoteEmbedder {
    pub fn from_config(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_REMOTE_MODEL.to_string());
        let dims = config
            .dimensions
            .or_else(|| known_dimensions(&model))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "[embedding] dimensions must be set for remote model '{}'",
                    model
                ))
            })?;
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            api_key,
            model,
            dims,
            batch_size: config.batch_size.max(1),
            timeout,
        })
    }

    async fn embed_batch(&self, batch: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingsRequest {
            model: &self.model,
            input: batch,
        });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout(self.timeout)
            } else {
                EmbeddingError::Unavailable(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(EmbeddingError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Unavailable(format!(
                "embedding request failed ({}): {}",
                status, text
            )));
        }

        let body: EmbeddingsResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout(self.timeout)
            } else {
                EmbeddingError::MalformedResponse(format!("failed to parse response: {}", e))
            }
        })?;

        let mut data = body.data;
        if data.iter().all(|d| d.index.is_some()) {
            data.sort_by_key(|d| d.index);
        }
        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        verify_batch(&vectors, batch.len(), self.dims)?;
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(batch = batch.len(), model = %self.model, "Requesting remote embeddings");
            out.extend(self.embed_batch(batch).await?);
        }
        Ok(out)
    }
}
