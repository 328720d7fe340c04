//! Embedding backends.
//!
//! [`Embedder`] is the one capability ingestion and retrieval depend on.
//! The concrete backend is chosen once at startup from
//! [`EmbeddingConfig`](crate::utils::toml_config::EmbeddingConfig) by
//! [`create_embedder`] and injected as an `Arc<dyn Embedder>`.
//!
//! | Backend   | Type                                          | Network |
//! |-----------|-----------------------------------------------|---------|
//! | `hashing` | [`HashingEmbedder`]                           | no      |
//! | `local`   | `LocalEmbedder` (feature `local-embeddings`) | model download on first use |
//! | `remote`  | [`RemoteEmbedder`](super::remote::RemoteEmbedder) | yes |

use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingBackend, RagBenchConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Failures of an embedding backend.
///
/// Only the remote backend produces transient errors; callers may retry
/// those with backoff.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("embedding backend rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding model error: {0}")]
    Model(String),
}

impl EmbeddingError {
    /// Whether a retry with backoff may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EmbeddingError::Timeout(_)
                | EmbeddingError::RateLimited { .. }
                | EmbeddingError::Unavailable(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EmbeddingError::Timeout(_) => "embedding_timeout",
            EmbeddingError::RateLimited { .. } => "embedding_rate_limited",
            EmbeddingError::Unavailable(_) => "embedding_unavailable",
            EmbeddingError::MalformedResponse(_) => "embedding_malformed_response",
            EmbeddingError::Model(_) => "embedding_model_error",
        }
    }
}

/// Converts text into fixed-length vectors.
///
/// `embed` returns exactly one vector per input, in input order, each of
/// length [`dimensions`](Embedder::dimensions). An empty input list yields
/// an empty result, not an error.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, recorded alongside stored vectors.
    fn model_name(&self) -> &str;

    /// Length of every vector this backend produces.
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts in as few backend calls as possible.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single text.
    async fn embed_one(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        self.embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| EmbeddingError::MalformedResponse("no vector returned".to_string()))
    }
}

/// Check a backend's output against the request before anyone stores it.
pub fn verify_batch(
    vectors: &[Vec<f32>],
    expected_count: usize,
    dimensions: usize,
) -> std::result::Result<(), EmbeddingError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::MalformedResponse(format!(
            "expected {} vectors, got {}",
            expected_count,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(EmbeddingError::MalformedResponse(format!(
            "expected {} dimensions, got {}",
            dimensions,
            bad.len()
        )));
    }
    if vectors.iter().flatten().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::MalformedResponse(
            "vector contains NaN or Inf".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Hashing Embedder
// ============================================================================

/// Default model name for [`HashingEmbedder`].
pub const HASHING_MODEL: &str = "feature-hashing-v1";

/// Default dimension for [`HashingEmbedder`].
pub const HASHING_DIMENSIONS: usize = 384;

/// Deterministic, offline embedder based on FNV-1a feature hashing.
///
/// Word features (weight 1.0) and character bigram features (weight 0.5)
/// are hashed into a fixed number of buckets and the result is
/// L2-normalised. Texts sharing words and character patterns land closer
/// together than unrelated texts. Never returns the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model: String,
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        Self::with_model(HASHING_MODEL, dims)
    }

    pub fn with_model(model: impl Into<String>, dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(AppError::Config(
                "embedding dimensions must be > 0".to_string(),
            ));
        }
        Ok(Self {
            model: model.into(),
            dims,
        })
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();

        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            embedding[self.bucket(word.as_bytes())] += 1.0;
        }

        let bytes = lower.as_bytes();
        for bigram in bytes.windows(2) {
            embedding[self.bucket(bigram)] += 0.5;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        } else {
            // Single-byte or empty text: fall back to a bucket keyed on the raw bytes.
            embedding[self.bucket(bytes)] = 1.0;
        }
        embedding
    }

    fn bucket(&self, bytes: &[u8]) -> usize {
        (fnv1a(bytes) % self.dims as u64) as usize
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// FNV-1a 64-bit hash.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 14695981039346656037;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(1099511628211);
    }
    hash
}

// ============================================================================
// Factory
// ============================================================================

/// Build the embedder selected by `[embedding] backend`.
pub fn create_embedder(config: &RagBenchConfig) -> Result<Arc<dyn Embedder>> {
    let settings = &config.embedding;
    let embedder: Arc<dyn Embedder> = match settings.backend {
        EmbeddingBackend::Hashing => Arc::new(HashingEmbedder::with_model(
            settings.model.clone().unwrap_or_else(|| HASHING_MODEL.to_string()),
            settings.dimensions.unwrap_or(HASHING_DIMENSIONS),
        )?),
        EmbeddingBackend::Remote => {
            let api_key = config
                .embedding_api_key()
                .map_err(|e| AppError::Config(e.to_string()))?;
            Arc::new(super::remote::RemoteEmbedder::from_config(settings, api_key)?)
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingBackend::Local => Arc::new(super::local::LocalEmbedder::new(
            settings.model.as_deref(),
        )?),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingBackend::Local => {
            return Err(AppError::Config(
                "embedding backend 'local' requires building with the `local-embeddings` feature"
                    .to_string(),
            ))
        }
    };

    info!(
        backend = ?settings.backend,
        model = embedder.model_name(),
        dimensions = embedder.dimensions(),
        "Embedding backend ready"
    );
    Ok(embedder)
}
