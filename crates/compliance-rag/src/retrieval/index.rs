//! Nearest-neighbor index over chunk embeddings
//!
//! Exact scan over all stored vectors, parallelised with rayon. Results are
//! ordered by ascending distance with ties broken by insertion order, so the
//! same index and query always produce the same ranking.

use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Distance metric, fixed when the index is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)` floored at orthogonal; 0 for identical direction,
    /// 1 for orthogonal or opposed vectors
    #[default]
    Cosine,
    /// L2 distance; unbounded
    Euclidean,
}

impl DistanceMetric {
    /// Whether distances stay within [0, 1], so `1 - distance` is a similarity
    pub fn is_bounded(&self) -> bool {
        matches!(self, DistanceMetric::Cosine)
    }

    fn distance(&self, query: &[f32], query_norm: f32, entry: &IndexEntry) -> f32 {
        if query == &*entry.embedding {
            return 0.0;
        }
        match self {
            DistanceMetric::Cosine => {
                if query_norm == 0.0 || entry.norm == 0.0 {
                    return 1.0;
                }
                let dot: f32 = query.iter().zip(entry.embedding.iter()).map(|(a, b)| a * b).sum();
                (1.0 - dot / (query_norm * entry.norm)).clamp(0.0, 1.0)
            }
            DistanceMetric::Euclidean => query
                .iter()
                .zip(entry.embedding.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

/// A raw index hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    pub chunk_id: Uuid,
    pub distance: f32,
}

struct IndexEntry {
    chunk_id: Uuid,
    embedding: Arc<[f32]>,
    norm: f32,
}

#[derive(Default)]
struct IndexState {
    /// Insertion order is the tie-break order
    entries: Vec<IndexEntry>,
    positions: HashMap<Uuid, usize>,
}

/// Vector index over chunk embeddings
pub struct VectorIndex {
    dimensions: usize,
    metric: DistanceMetric,
    state: RwLock<IndexState>,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new(dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            dimensions,
            metric,
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    /// Insert a chunk embedding
    ///
    /// Returns `false` if the chunk was already indexed (re-insert is a no-op).
    pub fn insert(&self, chunk_id: Uuid, embedding: Arc<[f32]>) -> Result<bool> {
        self.check_dimensions(&embedding)?;

        // Entry is fully built before the write lock is taken
        let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        let entry = IndexEntry {
            chunk_id,
            embedding,
            norm,
        };

        let mut state = self.state.write();
        if state.positions.contains_key(&chunk_id) {
            return Ok(false);
        }
        let position = state.entries.len();
        state.entries.push(entry);
        state.positions.insert(chunk_id, position);
        Ok(true)
    }

    /// k nearest neighbors, ascending by distance
    pub fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        self.query_filtered(embedding, k, |_| true)
    }

    /// k nearest neighbors among chunks accepted by `filter`
    pub fn query_filtered<F>(&self, embedding: &[f32], k: usize, filter: F) -> Result<Vec<IndexHit>>
    where
        F: Fn(&Uuid) -> bool + Sync,
    {
        self.check_dimensions(embedding)?;

        let state = self.state.read();
        if k == 0 || state.entries.is_empty() {
            return Ok(Vec::new());
        }

        let query_norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        let mut scored: Vec<(usize, f32)> = state
            .entries
            .par_iter()
            .enumerate()
            .filter(|(_, entry)| filter(&entry.chunk_id))
            .map(|(position, entry)| (position, self.metric.distance(embedding, query_norm, entry)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| IndexHit {
                chunk_id: state.entries[position].chunk_id,
                distance,
            })
            .collect())
    }

    pub fn contains(&self, chunk_id: &Uuid) -> bool {
        self.state.read().positions.contains_key(chunk_id)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
