use crate::rag::embeddings::EmbeddingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::{IntoParams, ToSchema};

// ============= Document Types =============

/// Where a document's text came from.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Text,
    Url,
    Wiki,
    News,
    Financial,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Text => "text",
            SourceType::Url => "url",
            SourceType::Wiki => "wiki",
            SourceType::News => "news",
            SourceType::Financial => "financial",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceType {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(SourceType::Text),
            "url" => Ok(SourceType::Url),
            "wiki" | "wikipedia" => Ok(SourceType::Wiki),
            "news" => Ok(SourceType::News),
            "financial" | "finance" => Ok(SourceType::Financial),
            other => Err(AppError::InvalidInput(format!(
                "Unknown source type '{}'. Use: text, url, wiki, news, financial",
                other
            ))),
        }
    }
}

/// Scalar metadata value.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(i: i64) -> Self {
        MetadataValue::Int(i)
    }
}

impl From<f64> for MetadataValue {
    fn from(f: f64) -> Self {
        MetadataValue::Float(f)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// Open mapping of metadata keys (title, url, author, published_at, ticker, ...).
///
/// Ordered so its canonical JSON form is stable across runs.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A logical unit of ingested content. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct Document {
    pub id: String,
    pub source_type: SourceType,
    #[serde(default)]
    pub metadata: Metadata,
    pub ingested_at: DateTime<Utc>,
}

impl Document {
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(MetadataValue::as_str)
    }
}

/// A contiguous slice of a document's text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

// ============= API Request/Response Types =============

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct IngestRequest {
    /// Raw text to ingest. Exactly one of `content` and `url` is required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Page to fetch and ingest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Defaults to `url` for URL ingestion and `text` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    /// Overrides the content-derived id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<usize>,
    /// Collapse whitespace and strip tags from `content` before chunking.
    #[serde(default)]
    pub normalize: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    pub status: String,
    pub document_id: String,
    pub chunks: usize,
    pub vector_store_size: usize,
}

/// `GET /query` parameters.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct QueryParams {
    /// Query text.
    pub q: String,
    pub top_k: Option<usize>,
    pub threshold: Option<f32>,
}

/// `POST /query` body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    #[serde(alias = "q")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl From<QueryParams> for QueryRequest {
    fn from(p: QueryParams) -> Self {
        Self {
            query: p.q,
            top_k: p.top_k,
            threshold: p.threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct QueryResultItem {
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub metadata: Metadata,
    pub similarity: f32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<QueryResultItem>,
    pub total_results: usize,
    pub query_time_ms: f64,
    /// Set when the query failed; `results` is then empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
    pub vector_store_size: usize,
    pub document_count: usize,
    pub last_ingest_timestamp: Option<DateTime<Utc>>,
    pub embedding_model: String,
    pub embedding_dimension: Option<usize>,
    pub index_algorithm: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentSummary {
    pub id: String,
    pub source_type: SourceType,
    pub title: Option<String>,
    pub chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChunkView {
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentDetail {
    pub document: Document,
    pub chunks: Vec<ChunkView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RebuildResponse {
    pub status: String,
    pub documents: usize,
    pub vector_store_size: usize,
    /// Documents whose stored embeddings could not be reused.
    pub reembedded: usize,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid chunking or service parameters. Caller bug, not retried.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vectors from different embedding backends were mixed.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A storage write failed after embedding succeeded.
    #[error("Ingestion failed while {stage}: {source}")]
    Ingestion {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap a write-phase failure, keeping the original error as the source.
    pub fn ingestion<E>(stage: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        AppError::Ingestion {
            stage,
            source: Box::new(source),
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Embedding(e) => e.kind(),
            AppError::DimensionMismatch { .. } => "dimension_mismatch",
            AppError::NotFound(_) => "not_found",
            AppError::CorruptIndex(_) => "corrupt_index",
            AppError::Ingestion { .. } => "ingestion_error",
            AppError::Storage(_) => "storage_error",
            AppError::Fetch(_) => "fetch_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<ragbench_vector::Error> for AppError {
    fn from(err: ragbench_vector::Error) -> Self {
        use ragbench_vector::Error as VectorError;
        match err {
            VectorError::DimensionMismatch { expected, actual } => {
                AppError::DimensionMismatch { expected, actual }
            }
            VectorError::CorruptIndex(msg) => AppError::CorruptIndex(msg),
            VectorError::Configuration(msg) => AppError::Config(msg),
            VectorError::InvalidVector(msg) => AppError::Internal(format!("invalid vector: {}", msg)),
            VectorError::Io(e) => AppError::Storage(e.to_string()),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::Config(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Embedding(EmbeddingError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Embedding(EmbeddingError::RateLimited { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            AppError::Embedding(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::DimensionMismatch { .. }
            | AppError::CorruptIndex(_)
            | AppError::Ingestion { .. }
            | AppError::Storage(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
