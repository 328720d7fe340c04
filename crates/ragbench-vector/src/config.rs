//! Configuration for ragbench-vector.

use crate::error::{Error, Result};
use std::fmt;

/// Search algorithm backing a [`VectorIndex`](crate::VectorIndex).
///
/// Both algorithms honour the same contract: results ranked by descending
/// cosine similarity with ties broken by insertion order. They differ only
/// in how candidates are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum IndexAlgorithm {
    /// Exact brute-force cosine scan over every entry.
    #[default]
    Flat,

    /// HNSW graph proposes candidates, which are then re-scored exactly.
    ///
    /// Approximate: an entry the graph fails to reach can be missing from
    /// the results.
    Hnsw,
}

impl IndexAlgorithm {
    /// Get the name of this algorithm, as stored in the index file header.
    pub fn name(&self) -> &'static str {
        match self {
            IndexAlgorithm::Flat => "flat",
            IndexAlgorithm::Hnsw => "hnsw",
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            IndexAlgorithm::Flat => 0,
            IndexAlgorithm::Hnsw => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(IndexAlgorithm::Flat),
            1 => Some(IndexAlgorithm::Hnsw),
            _ => None,
        }
    }
}

impl fmt::Display for IndexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for IndexAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" | "exact" | "brute_force" => Ok(IndexAlgorithm::Flat),
            "hnsw" => Ok(IndexAlgorithm::Hnsw),
            _ => Err(format!("Unknown index algorithm: {}", s)),
        }
    }
}

/// Configuration for a vector index.
#[derive(Debug, Clone, Default)]
pub struct IndexConfig {
    /// Search algorithm.
    pub algorithm: IndexAlgorithm,

    /// Fixed vector dimension. When `None` the first `add` fixes it.
    pub dimension: Option<usize>,

    /// HNSW parameters, used when `algorithm` is [`IndexAlgorithm::Hnsw`].
    pub hnsw: HnswConfig,

    /// Name of the embedding model that produced the vectors.
    ///
    /// Recorded in the index file so a backend switch can be detected on load.
    pub embedding_model: Option<String>,
}

impl IndexConfig {
    /// Exact-scan index.
    pub fn flat() -> Self {
        Self::default()
    }

    /// HNSW-accelerated index with default parameters.
    pub fn hnsw() -> Self {
        Self {
            algorithm: IndexAlgorithm::Hnsw,
            ..Self::default()
        }
    }

    /// Fix the vector dimension up front.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Set the HNSW configuration.
    pub fn with_hnsw_config(mut self, config: HnswConfig) -> Self {
        self.hnsw = config;
        self
    }

    /// Record the embedding model name.
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    /// Check the configuration for values the index cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == Some(0) {
            return Err(Error::Configuration("dimension must be > 0".to_string()));
        }
        self.hnsw.validate()
    }
}

/// HNSW index configuration.
///
/// These parameters control the trade-off between search accuracy,
/// speed, and memory usage.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HnswConfig {
    /// Maximum number of connections per element per layer.
    ///
    /// Higher values improve search quality but use more memory.
    /// Typical values: 12-48. Default: 16.
    pub m: usize,

    /// Size of the dynamic candidate list during construction.
    ///
    /// Typical values: 100-500. Default: 200.
    pub ef_construction: usize,

    /// Size of the dynamic candidate list during search.
    ///
    /// Raised to the candidate count when a search asks for more. Default: 100.
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 100,
        }
    }
}

impl HnswConfig {
    /// Create a configuration optimized for speed.
    pub fn fast() -> Self {
        Self {
            m: 8,
            ef_construction: 100,
            ef_search: 50,
        }
    }

    /// Create a configuration optimized for accuracy.
    pub fn accurate() -> Self {
        Self {
            m: 32,
            ef_construction: 400,
            ef_search: 200,
        }
    }

    /// Set the M parameter (connections per layer).
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    /// Set the ef_construction parameter.
    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    /// Set the ef_search parameter.
    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.m == 0 || self.m > 256 {
            return Err(Error::Configuration(format!(
                "hnsw m must be in 1..=256, got {}",
                self.m
            )));
        }
        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(Error::Configuration(
                "hnsw ef_construction and ef_search must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
