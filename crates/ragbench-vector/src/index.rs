//! HNSW graph wrapper.
//!
//! The graph only proposes candidates; scoring and ordering stay with the
//! caller. Identical vectors share one graph point, and a point expands to
//! every index position holding that vector, in insertion order. Positions
//! refer to the owning index's entry list, so the graph is rebuilt whenever
//! entries are removed.

use crate::config::HnswConfig;
use anndists::dist::distances::DistCosine;
use hnsw_rs::hnsw::Hnsw;
use std::collections::HashMap;
use tracing::debug;

const MAX_LAYER: usize = 16;
const MIN_CAPACITY: usize = 1024;

/// HNSW graph over a subset of index positions.
pub(crate) struct HnswGraph {
    hnsw: Hnsw<'static, f32, DistCosine>,
    config: HnswConfig,
    capacity: usize,
    /// Graph point id -> positions sharing that exact vector.
    points: Vec<Vec<usize>>,
    /// Bit pattern of a vector -> its graph point id.
    point_ids: HashMap<Vec<u32>, usize>,
    covered: usize,
    /// Positions kept out of the graph because the vector has zero norm.
    unindexed: Vec<usize>,
}

impl HnswGraph {
    /// Build a graph sized for at least `expected` points.
    pub(crate) fn new(config: &HnswConfig, expected: usize) -> Self {
        let capacity = (expected * 2).max(MIN_CAPACITY);
        let hnsw = Hnsw::new(
            config.m,
            capacity,
            MAX_LAYER,
            config.ef_construction,
            DistCosine {},
        );
        Self {
            hnsw,
            config: config.clone(),
            capacity,
            points: Vec::new(),
            point_ids: HashMap::new(),
            covered: 0,
            unindexed: Vec::new(),
        }
    }

    /// Build a graph over `(position, vector, norm)` triples.
    pub(crate) fn build<'a, I>(config: &HnswConfig, points: I, expected: usize) -> Self
    where
        I: IntoIterator<Item = (usize, &'a [f32], f32)>,
    {
        let mut graph = Self::new(config, expected);
        for (position, vector, norm) in points {
            graph.insert(position, vector, norm);
        }
        debug!(
            points = graph.points.len(),
            positions = graph.covered,
            "Built HNSW graph"
        );
        graph
    }

    /// Whether another insert would exceed the sizing the graph was built with.
    pub(crate) fn is_full(&self) -> bool {
        self.points.len() >= self.capacity
    }

    /// Number of index positions covered, indexed or not.
    pub(crate) fn len(&self) -> usize {
        self.covered
    }

    /// Positions must be inserted in ascending order.
    pub(crate) fn insert(&mut self, position: usize, vector: &[f32], norm: f32) {
        self.covered += 1;
        if norm == 0.0 {
            self.unindexed.push(position);
            return;
        }
        let key: Vec<u32> = vector.iter().map(|v| v.to_bits()).collect();
        if let Some(&id) = self.point_ids.get(&key) {
            self.points[id].push(position);
            return;
        }
        let id = self.points.len();
        self.hnsw.insert_slice((vector, id));
        self.points.push(vec![position]);
        self.point_ids.insert(key, id);
    }

    /// Candidate positions for `query`, including every unindexed position
    /// and every duplicate of a candidate vector.
    pub(crate) fn candidates(&self, query: &[f32], top_k: usize) -> Vec<usize> {
        let mut positions = self.unindexed.clone();
        if self.points.is_empty() {
            return positions;
        }

        let knbn = (top_k * 2).max(top_k + 8).min(self.points.len());
        let ef = self.config.ef_search.max(knbn);
        for neighbour in self.hnsw.search(query, knbn, ef) {
            if let Some(shared) = self.points.get(neighbour.d_id) {
                positions.extend_from_slice(shared);
            }
        }
        positions
    }
}
