//! Vector index abstraction and the exact (flat) implementation.

use std::collections::BTreeMap;

use crate::types::{StateError, StateResult};

use super::cluster_index::ClusterIndex;

/// A nearest-neighbor hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Id of the indexed record.
    pub id: u64,
    /// Cosine distance to the query (0.0 = same direction, 2.0 = opposite).
    pub distance: f32,
}

/// A mutable vector index keyed by record id.
///
/// `knn` returns hits ascending by distance, ties broken by id. Approximate
/// implementations may miss true neighbors; callers post-filter and must
/// tolerate short result lists.
pub trait VectorIndex: Send + Sync {
    /// Vector width accepted by this index.
    fn dimension(&self) -> usize;

    /// Insert or replace the vector for `id`.
    fn insert(&mut self, id: u64, vector: Vec<f32>) -> StateResult<()>;

    /// Remove `id`. Returns whether it was present.
    fn remove(&mut self, id: u64) -> bool;

    /// The stored vector for `id`.
    fn get(&self, id: u64) -> Option<&[f32]>;

    /// The `k` nearest stored vectors to `query`.
    fn knn(&self, query: &[f32], k: usize) -> StateResult<Vec<Neighbor>>;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    /// Whether the index holds no vectors.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which [`VectorIndex`] implementation to create for new indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Exact brute-force search.
    Flat,
    /// k-means inverted file, probing the nearest `probes` clusters.
    Cluster { probes: usize, max_iterations: usize },
}

impl IndexKind {
    /// Create an empty index of this kind.
    pub fn create(&self, dimension: usize) -> Box<dyn VectorIndex> {
        match *self {
            Self::Flat => Box::new(FlatIndex::new(dimension)),
            Self::Cluster {
                probes,
                max_iterations,
            } => Box::new(ClusterIndex::new(dimension, probes, max_iterations)),
        }
    }
}

impl Default for IndexKind {
    fn default() -> Self {
        Self::Flat
    }
}

/// Exact nearest-neighbor index: scores every stored vector.
pub struct FlatIndex {
    dimension: usize,
    vectors: BTreeMap<u64, Vec<f32>>,
}

impl FlatIndex {
    /// Create a new, empty flat index.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: BTreeMap::new(),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&mut self, id: u64, vector: Vec<f32>) -> StateResult<()> {
        check_dimension(self.dimension, &vector)?;
        self.vectors.insert(id, vector);
        Ok(())
    }

    fn remove(&mut self, id: u64) -> bool {
        self.vectors.remove(&id).is_some()
    }

    fn get(&self, id: u64) -> Option<&[f32]> {
        self.vectors.get(&id).map(|v| v.as_slice())
    }

    fn knn(&self, query: &[f32], k: usize) -> StateResult<Vec<Neighbor>> {
        check_dimension(self.dimension, query)?;
        Ok(rank(
            query,
            self.vectors.iter().map(|(&id, v)| (id, v.as_slice())),
            k,
        ))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

/// Reject vectors whose width differs from the index dimension.
pub(crate) fn check_dimension(dimension: usize, vector: &[f32]) -> StateResult<()> {
    if vector.len() != dimension {
        return Err(StateError::DimensionMismatch {
            expected: dimension,
            got: vector.len(),
        });
    }
    Ok(())
}

/// Score candidates against `query` and keep the `k` closest.
pub(crate) fn rank<'a>(
    query: &[f32],
    candidates: impl Iterator<Item = (u64, &'a [f32])>,
    k: usize,
) -> Vec<Neighbor> {
    let mut hits: Vec<Neighbor> = candidates
        .map(|(id, vec)| Neighbor {
            id,
            distance: cosine_distance(query, vec),
        })
        .collect();
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len().min(b.len()) {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

/// Cosine distance: `1 - cosine_similarity`. Zero vectors sit at distance 1.0.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
