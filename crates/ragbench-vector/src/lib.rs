//! # ragbench-vector
//!
//! An embedded vector index mapping embeddings to document chunks, ranked
//! by cosine similarity.
//!
//! ## Features
//!
//! - **Exact or HNSW search**: a brute-force scan for correctness, or an
//!   HNSW graph proposing candidates that are then re-scored exactly
//! - **Deterministic ranking**: descending score, ties broken by insertion order
//! - **Fixed dimension**: set at construction or by the first `add`, never coerced
//! - **Checksummed persistence**: single-file format, written atomically
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragbench_vector::{IndexConfig, IndexEntry, VectorIndex};
//!
//! let index = VectorIndex::new(IndexConfig::flat().with_dimension(3))?;
//! index.add(vec![IndexEntry::new(vec![1.0, 0.0, 0.0], "doc-1", 0)])?;
//!
//! let hits = index.search(&[1.0, 0.0, 0.0], 5, 0.0)?;
//! index.persist("./data/vectors/default.index").await?;
//! ```
//!
//! ## Concurrency
//!
//! Index state sits behind a single reader/writer lock: searches share it,
//! while `add`, `replace_document` and `rebuild` take it exclusively.
//! `persist` snapshots under the read lock, so no write can interleave with
//! the snapshot, and file writes are serialized by an async mutex.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod distance;
pub mod error;
mod index;
mod persistence;
pub mod types;

pub use config::{HnswConfig, IndexAlgorithm, IndexConfig};
pub use distance::cosine_similarity;
pub use error::{Error, Result};
pub use types::{IndexEntry, IndexStats, SearchHit};

use crate::distance::{norm, similarity_with_norms};
use crate::index::HnswGraph;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Vector index over document chunks.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct VectorIndex {
    config: IndexConfig,
    state: RwLock<IndexState>,
    persist_lock: tokio::sync::Mutex<()>,
}

struct IndexState {
    dimension: Option<usize>,
    embedding_model: Option<String>,
    /// Insertion order; position doubles as the tie-break key.
    entries: Vec<StoredEntry>,
    graph: Option<HnswGraph>,
}

struct StoredEntry {
    document_id: String,
    chunk_index: usize,
    vector: Vec<f32>,
    norm: f32,
}

impl VectorIndex {
    /// Create an empty index.
    pub fn new(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let state = IndexState {
            dimension: config.dimension,
            embedding_model: config.embedding_model.clone(),
            entries: Vec::new(),
            graph: None,
        };
        Ok(Self {
            config,
            state: RwLock::new(state),
            persist_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed vector dimension, once known.
    pub fn dimension(&self) -> Option<usize> {
        self.state.read().dimension
    }

    /// Search algorithm in use.
    pub fn algorithm(&self) -> IndexAlgorithm {
        self.config.algorithm
    }

    /// Embedding model recorded for the stored vectors.
    pub fn embedding_model(&self) -> Option<String> {
        self.state.read().embedding_model.clone()
    }

    /// Snapshot of index statistics.
    pub fn stats(&self) -> IndexStats {
        let state = self.state.read();
        let documents = state
            .entries
            .iter()
            .map(|e| e.document_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        IndexStats {
            entries: state.entries.len(),
            documents,
            dimension: state.dimension,
            algorithm: self.config.algorithm,
            embedding_model: state.embedding_model.clone(),
        }
    }

    /// Number of entries per document, for reconciliation against a store.
    pub fn document_chunk_counts(&self) -> BTreeMap<String, usize> {
        let state = self.state.read();
        let mut counts = BTreeMap::new();
        for entry in &state.entries {
            *counts.entry(entry.document_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Append entries.
    ///
    /// Every vector is validated before anything is stored: one bad vector
    /// rejects the whole batch and leaves the index unchanged. Returns the
    /// number of entries added.
    pub fn add(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        let mut state = self.state.write();
        let dimension = validate_batch(state.dimension, entries.iter().map(|e| &e.vector[..]))?;
        let count = entries.len();
        self.append(&mut state, dimension, entries);
        debug!(count, total = state.entries.len(), "Added vectors");
        Ok(count)
    }

    /// Replace every entry of `document_id` with one entry per vector.
    ///
    /// Chunk indices are assigned from the vector positions, 0-based. The
    /// removal and the insert happen under one write lock, so searches see
    /// either the old chunks or the new ones. Returns the number of entries
    /// removed.
    pub fn replace_document(&self, document_id: &str, vectors: Vec<Vec<f32>>) -> Result<usize> {
        let mut state = self.state.write();
        let before = state.entries.len();
        let dimension = validate_batch(state.dimension, vectors.iter().map(|v| &v[..]))?;

        state.entries.retain(|e| e.document_id != document_id);
        let removed = before - state.entries.len();
        if removed > 0 {
            self.rebuild_graph(&mut state);
        }

        let entries = vectors
            .into_iter()
            .enumerate()
            .map(|(chunk_index, vector)| IndexEntry::new(vector, document_id, chunk_index))
            .collect();
        self.append(&mut state, dimension, entries);

        debug!(document_id, removed, total = state.entries.len(), "Replaced document vectors");
        Ok(removed)
    }

    /// Drop every entry of `document_id`. Returns the number removed.
    pub fn remove_document(&self, document_id: &str) -> usize {
        let mut state = self.state.write();
        let before = state.entries.len();
        state.entries.retain(|e| e.document_id != document_id);
        let removed = before - state.entries.len();
        if removed > 0 {
            self.rebuild_graph(&mut state);
        }
        removed
    }

    /// Swap the whole content for `entries`, recording `embedding_model`.
    ///
    /// The dimension is re-derived from the new entries (or the configured
    /// dimension), which is how an index moves to a different embedding
    /// backend.
    pub fn rebuild(&self, entries: Vec<IndexEntry>, embedding_model: Option<String>) -> Result<()> {
        let dimension = validate_batch(self.config.dimension, entries.iter().map(|e| &e.vector[..]))?;
        let mut state = self.state.write();
        state.entries.clear();
        state.graph = None;
        state.dimension = self.config.dimension;
        state.embedding_model = embedding_model;
        let count = entries.len();
        self.append(&mut state, dimension, entries);
        info!(count, dimension = ?state.dimension, "Rebuilt vector index");
        Ok(())
    }

    /// Top `top_k` entries with cosine similarity ≥ `threshold`.
    ///
    /// Ordered by descending score, ties broken by insertion order. An empty
    /// index (or `top_k == 0`) yields no hits rather than an error.
    pub fn search(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<SearchHit>> {
        let state = self.state.read();
        if state.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        validate_vector(state.dimension, query)?;

        let query_norm = norm(query);
        let score = |pos: usize| {
            let entry = &state.entries[pos];
            (pos, similarity_with_norms(query, &entry.vector, query_norm * entry.norm))
        };

        let rank = |a: &(usize, f32), b: &(usize, f32)| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        };
        let exact = || -> Vec<(usize, f32)> {
            (0..state.entries.len())
                .map(score)
                .filter(|(_, s)| *s >= threshold)
                .collect()
        };

        let mut scored = match &state.graph {
            Some(graph) if query_norm > 0.0 && state.entries.len() > self.config.hnsw.ef_search => {
                let mut candidates = graph.candidates(query, top_k);
                candidates.sort_unstable();
                candidates.dedup();
                let mut ranked: Vec<(usize, f32)> = candidates
                    .into_iter()
                    .map(score)
                    .filter(|(_, s)| *s >= threshold)
                    .collect();
                ranked.sort_by(rank);
                if boundary_tie_across_vectors(&state.entries, &ranked, top_k) {
                    debug!(top_k, "Tied scores at the top-k boundary, using exact scan");
                    exact()
                } else {
                    ranked
                }
            }
            _ => exact(),
        };

        if scored.len() > top_k {
            scored.select_nth_unstable_by(top_k - 1, rank);
            scored.truncate(top_k);
        }
        scored.sort_by(rank);

        Ok(scored
            .into_iter()
            .map(|(pos, score)| {
                let entry = &state.entries[pos];
                SearchHit {
                    document_id: entry.document_id.clone(),
                    chunk_index: entry.chunk_index,
                    score,
                }
            })
            .collect())
    }

    /// Write the full index to `path`.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let _guard = self.persist_lock.lock().await;
        let (bytes, count) = {
            let state = self.state.read();
            let bytes = persistence::encode(
                self.config.algorithm,
                state.dimension,
                state.embedding_model.as_deref(),
                state.entries.len(),
                state
                    .entries
                    .iter()
                    .map(|e| (e.document_id.as_str(), e.chunk_index, e.vector.as_slice())),
            )?;
            (bytes, state.entries.len())
        };
        persistence::write_atomic(path.as_ref(), &bytes).await?;
        info!(entries = count, bytes = bytes.len(), "Persisted vector index");
        Ok(())
    }

    /// Load an index previously written by [`persist`](Self::persist).
    ///
    /// Fails with [`Error::CorruptIndex`] when the file does not pass its
    /// integrity checks, and with [`Error::DimensionMismatch`] when the
    /// config fixes a dimension the file disagrees with. The search
    /// algorithm comes from `config`; the stored tag is informational.
    #[instrument(skip(path, config), fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>, config: IndexConfig) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let snapshot = persistence::decode(&bytes)?;

        if let (Some(expected), Some(actual)) = (config.dimension, snapshot.dimension) {
            if expected != actual {
                return Err(Error::DimensionMismatch { expected, actual });
            }
        }
        if snapshot.algorithm != config.algorithm {
            info!(
                stored = %snapshot.algorithm,
                configured = %config.algorithm,
                "Index algorithm changed since last persist"
            );
        }

        let config = IndexConfig {
            embedding_model: snapshot.embedding_model.clone(),
            ..config
        };
        let index = Self::new(config)?;
        index.state.write().dimension = snapshot.dimension.or(index.config.dimension);
        let count = snapshot.entries.len();
        index.add(snapshot.entries)?;

        info!(entries = count, dimension = ?index.dimension(), "Loaded vector index");
        Ok(index)
    }

    // Caller holds the write lock and has validated every vector.
    fn append(&self, state: &mut IndexState, dimension: Option<usize>, entries: Vec<IndexEntry>) {
        if state.dimension.is_none() {
            state.dimension = dimension;
        }
        for entry in entries {
            let norm = norm(&entry.vector);
            state.entries.push(StoredEntry {
                document_id: entry.document_id,
                chunk_index: entry.chunk_index,
                vector: entry.vector,
                norm,
            });
        }
        self.sync_graph(state);
    }

    // Bring the graph up to date with entries appended since the last sync.
    fn sync_graph(&self, state: &mut IndexState) {
        if self.config.algorithm != IndexAlgorithm::Hnsw {
            return;
        }
        let covered = state
            .graph
            .as_ref()
            .filter(|graph| !graph.is_full())
            .map(HnswGraph::len);
        let Some(covered) = covered else {
            self.rebuild_graph(state);
            return;
        };
        let IndexState { entries, graph, .. } = state;
        if let Some(graph) = graph.as_mut() {
            for (pos, entry) in entries.iter().enumerate().skip(covered) {
                graph.insert(pos, &entry.vector, entry.norm);
            }
        }
    }

    fn rebuild_graph(&self, state: &mut IndexState) {
        if self.config.algorithm != IndexAlgorithm::Hnsw {
            return;
        }
        let points = state
            .entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (pos, e.vector.as_slice(), e.norm));
        state.graph = Some(HnswGraph::build(&self.config.hnsw, points, state.entries.len()));
    }
}

/// Whether the k-th best candidate shares its score with a candidate holding
/// a different vector. Entries outside the candidate set may then tie too,
/// and only an exact scan can order them by insertion. Identical vectors are
/// already expanded in full by the graph.
fn boundary_tie_across_vectors(entries: &[StoredEntry], ranked: &[(usize, f32)], top_k: usize) -> bool {
    if ranked.len() < top_k {
        return false;
    }
    let (edge, edge_score) = ranked[top_k - 1];
    let edge_vector = &entries[edge].vector;
    ranked
        .iter()
        .any(|&(pos, s)| s == edge_score && entries[pos].vector != *edge_vector)
}

/// Validate one vector against an optional fixed dimension.
fn validate_vector(dimension: Option<usize>, vector: &[f32]) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::InvalidVector("vector is empty".to_string()));
    }
    if let Some(expected) = dimension {
        if vector.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidVector("vector contains NaN or Inf".to_string()));
    }
    Ok(())
}

/// Validate a batch; the first vector fixes the dimension when none is set.
fn validate_batch<'a, I>(dimension: Option<usize>, vectors: I) -> Result<Option<usize>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut dimension = dimension;
    for vector in vectors {
        validate_vector(dimension, vector)?;
        dimension.get_or_insert(vector.len());
    }
    Ok(dimension)
}
