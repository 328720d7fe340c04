//! TOML-based configuration for ragbench
//!
//! One immutable [`RagBenchConfig`] is loaded from `ragbench.toml` at process
//! start and handed to every component constructor. Every field has a
//! default, so an empty file (or no file at all) yields a working setup:
//! hashing embedder, flat index, data under `./data`.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8000
//! log_format = "json"
//!
//! [storage]
//! index_path = "./data/vectors/default.index"
//! documents_path = "./data/documents"
//!
//! [index]
//! algorithm = "hnsw"
//!
//! [embedding]
//! backend = "remote"
//! model = "text-embedding-ada-002"
//! api_key_env = "OPENAI_API_KEY"
//! ```

use crate::rag::chunker;
use ragbench_vector::{HnswConfig, IndexAlgorithm};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Root configuration structure loaded from ragbench.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagBenchConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub rag: RagConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_body_limit")]
    pub request_body_limit_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            request_body_limit_bytes: default_body_limit(),
        }
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Persisted vector index file
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Directory of per-document JSON files
    #[serde(default = "default_documents_path")]
    pub documents_path: PathBuf,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/vectors/default.index")
}

fn default_documents_path() -> PathBuf {
    PathBuf::from("./data/documents")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            documents_path: default_documents_path(),
        }
    }
}

// ============= Index Configuration =============

/// What to do when the persisted index cannot be used as-is at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPolicy {
    /// Refuse to start.
    Fail,
    /// Rebuild the index from the document store.
    Rebuild,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub algorithm: IndexAlgorithm,

    /// Index and document store disagree, or the embedding model changed
    #[serde(default = "default_on_mismatch")]
    pub on_startup_mismatch: RecoveryPolicy,

    /// Index file fails its integrity check
    #[serde(default = "default_on_corrupt")]
    pub on_corrupt: RecoveryPolicy,

    #[serde(default)]
    pub hnsw: HnswConfig,
}

fn default_on_mismatch() -> RecoveryPolicy {
    RecoveryPolicy::Rebuild
}

fn default_on_corrupt() -> RecoveryPolicy {
    RecoveryPolicy::Fail
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            algorithm: IndexAlgorithm::default(),
            on_startup_mismatch: default_on_mismatch(),
            on_corrupt: default_on_corrupt(),
            hnsw: HnswConfig::default(),
        }
    }
}

// ============= RAG Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    #[serde(default = "default_max_top_k")]
    pub max_top_k: usize,

    #[serde(default)]
    pub default_threshold: f32,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    5
}

fn default_max_top_k() -> usize {
    100
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            default_top_k: default_top_k(),
            max_top_k: default_max_top_k(),
            default_threshold: 0.0,
        }
    }
}

// ============= Embedding Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Deterministic feature hashing, offline
    #[default]
    Hashing,
    /// fastembed ONNX model (requires the `local-embeddings` feature)
    Local,
    /// OpenAI-compatible `/embeddings` endpoint
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    /// Model name; each backend has its own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Vector dimension. Required for remote models the client does not know.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Environment variable name containing the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Texts per remote request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

fn default_batch_size() -> usize {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            model: None,
            dimensions: None,
            api_base: default_api_base(),
            api_key_env: None,
            timeout_secs: default_embedding_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

// ============= Fetch Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Pages larger than this are rejected
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

fn default_fetch_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("ragbench/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl RagBenchConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::FileNotFound(p)) => {
                info!(path = %p.display(), "No configuration file, using defaults");
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
            other => other,
        }
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RagBenchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, e.g. for `ragbench-server init`
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        chunker::validate_params(self.rag.chunk_size, self.rag.chunk_overlap)
            .map_err(|e| ConfigError::ValidationError(format!("[rag] {}", e)))?;

        if self.rag.default_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "[rag] default_top_k must be > 0".to_string(),
            ));
        }
        if self.rag.max_top_k < self.rag.default_top_k {
            return Err(ConfigError::ValidationError(format!(
                "[rag] max_top_k ({}) must be >= default_top_k ({})",
                self.rag.max_top_k, self.rag.default_top_k
            )));
        }
        if !(-1.0..=1.0).contains(&self.rag.default_threshold) {
            return Err(ConfigError::ValidationError(
                "[rag] default_threshold must be within [-1, 1]".to_string(),
            ));
        }

        let hnsw = &self.index.hnsw;
        if hnsw.m == 0 || hnsw.ef_construction == 0 || hnsw.ef_search == 0 {
            return Err(ConfigError::ValidationError(
                "[index.hnsw] m, ef_construction and ef_search must be > 0".to_string(),
            ));
        }

        if self.embedding.dimensions == Some(0) {
            return Err(ConfigError::ValidationError(
                "[embedding] dimensions must be > 0".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 || self.embedding.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "[embedding] batch_size and timeout_secs must be > 0".to_string(),
            ));
        }
        if self.embedding.backend == EmbeddingBackend::Remote {
            if self.embedding.api_base.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "[embedding] api_base is required for the remote backend".to_string(),
                ));
            }
            if let Some(ref env) = self.embedding.api_key_env {
                self.validate_env_var(env)?;
            }
        }

        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "[fetch] timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_env_var(&self, name: &str) -> Result<(), ConfigError> {
        std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
        Ok(())
    }

    /// Resolve an environment variable name to its value
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// API key for the remote embedding backend, if one is configured
    pub fn embedding_api_key(&self) -> Result<Option<String>, ConfigError> {
        match self.embedding.api_key_env {
            Some(ref env) => self
                .resolve_env(env)
                .map(Some)
                .ok_or_else(|| ConfigError::MissingEnvVar(env.clone())),
            None => Ok(None),
        }
    }
}
