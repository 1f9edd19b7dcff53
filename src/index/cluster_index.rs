//! Cluster index: k-means inverted file over stored vectors (approximate).

use std::collections::{BTreeMap, HashMap};

use crate::types::StateResult;

use super::vector_index::{check_dimension, cosine_similarity, rank, Neighbor, VectorIndex};

/// Below this many clusterable vectors the index answers by brute force.
const MIN_CLUSTER_POINTS: usize = 16;

/// Approximate nearest-neighbor index.
///
/// Vectors are grouped around k-means centroids with
/// k = min(ceil(sqrt(n)), 256). A query scores only the members of the
/// `probes` clusters whose centroids are closest, plus any zero vectors
/// (which cannot be clustered). Clusters are rebuilt whenever the index
/// has doubled since the last build.
pub struct ClusterIndex {
    dimension: usize,
    probes: usize,
    max_iterations: usize,
    vectors: BTreeMap<u64, Vec<f32>>,
    /// Cluster centroids.
    centroids: Vec<Vec<f32>>,
    /// cluster_index -> sorted ids in that cluster.
    assignments: Vec<Vec<u64>>,
    /// Zero vectors; always scanned.
    unclustered: Vec<u64>,
    /// Vector count at the last rebuild.
    built_len: usize,
}

impl ClusterIndex {
    /// Create a new, empty cluster index.
    pub fn new(dimension: usize, probes: usize, max_iterations: usize) -> Self {
        Self {
            dimension,
            probes: probes.max(1),
            max_iterations: max_iterations.max(1),
            vectors: BTreeMap::new(),
            centroids: Vec::new(),
            assignments: Vec::new(),
            unclustered: Vec::new(),
            built_len: 0,
        }
    }

    /// Recompute centroids and assignments from every stored vector.
    pub fn rebuild(&mut self) {
        self.centroids.clear();
        self.assignments.clear();
        self.unclustered.clear();
        self.built_len = self.vectors.len();

        let mut non_zero: Vec<(u64, &[f32])> = Vec::with_capacity(self.vectors.len());
        for (&id, vec) in &self.vectors {
            if is_zero(vec) {
                self.unclustered.push(id);
            } else {
                non_zero.push((id, vec.as_slice()));
            }
        }

        if non_zero.len() < MIN_CLUSTER_POINTS {
            return;
        }

        let k = ((non_zero.len() as f64).sqrt().ceil() as usize).min(256);

        // Initialize centroids: pick k evenly-spaced vectors
        let step = non_zero.len() / k;
        let mut centroids: Vec<Vec<f32>> = (0..k)
            .map(|i| {
                let idx = (i * step).min(non_zero.len() - 1);
                non_zero[idx].1.to_vec()
            })
            .collect();
        let mut assignments: Vec<Vec<u64>> = vec![Vec::new(); k];
        let lookup: HashMap<u64, &[f32]> = non_zero.iter().copied().collect();

        for _ in 0..self.max_iterations {
            for a in &mut assignments {
                a.clear();
            }
            for &(id, vec) in &non_zero {
                assignments[nearest(&centroids, vec)].push(id);
            }

            let mut changed = false;
            for (ci, cluster_ids) in assignments.iter().enumerate() {
                if cluster_ids.is_empty() {
                    continue;
                }
                let mut new_centroid = vec![0.0f32; self.dimension];
                let count = cluster_ids.len() as f32;
                for id in cluster_ids {
                    if let Some(vec) = lookup.get(id) {
                        for (j, &val) in vec.iter().enumerate() {
                            new_centroid[j] += val;
                        }
                    }
                }
                for val in &mut new_centroid {
                    *val /= count;
                }
                if new_centroid != centroids[ci] {
                    changed = true;
                    centroids[ci] = new_centroid;
                }
            }

            if !changed {
                break;
            }
        }

        for a in &mut assignments {
            a.sort_unstable();
        }
        log::debug!(
            "cluster index rebuilt: {} vectors in {} clusters",
            non_zero.len(),
            k
        );
        self.centroids = centroids;
        self.assignments = assignments;
    }

    fn assign(&mut self, id: u64) {
        if self.centroids.is_empty() {
            return;
        }
        let Some(vec) = self.vectors.get(&id) else {
            return;
        };
        let list = if is_zero(vec) {
            &mut self.unclustered
        } else {
            let cluster = nearest(&self.centroids, vec);
            &mut self.assignments[cluster]
        };
        let pos = list.binary_search(&id).unwrap_or_else(|p| p);
        list.insert(pos, id);
    }

    fn unassign(&mut self, id: u64) {
        for list in self
            .assignments
            .iter_mut()
            .chain(std::iter::once(&mut self.unclustered))
        {
            if let Ok(pos) = list.binary_search(&id) {
                list.remove(pos);
                return;
            }
        }
    }
}

impl VectorIndex for ClusterIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&mut self, id: u64, vector: Vec<f32>) -> StateResult<()> {
        check_dimension(self.dimension, &vector)?;
        if self.vectors.insert(id, vector).is_some() {
            self.unassign(id);
        }

        let len = self.vectors.len();
        if self.centroids.is_empty() {
            if len >= MIN_CLUSTER_POINTS && len >= 2 * self.built_len.max(1) {
                self.rebuild();
            } else {
                self.assign(id);
            }
        } else if len >= 2 * self.built_len {
            self.rebuild();
        } else {
            self.assign(id);
        }
        Ok(())
    }

    fn remove(&mut self, id: u64) -> bool {
        if self.vectors.remove(&id).is_none() {
            return false;
        }
        self.unassign(id);
        true
    }

    fn get(&self, id: u64) -> Option<&[f32]> {
        self.vectors.get(&id).map(|v| v.as_slice())
    }

    fn knn(&self, query: &[f32], k: usize) -> StateResult<Vec<Neighbor>> {
        check_dimension(self.dimension, query)?;

        if self.centroids.is_empty() {
            return Ok(rank(
                query,
                self.vectors.iter().map(|(&id, v)| (id, v.as_slice())),
                k,
            ));
        }

        let mut by_centroid: Vec<(usize, f32)> = self
            .centroids
            .iter()
            .enumerate()
            .map(|(i, c)| (i, cosine_similarity(query, c)))
            .collect();
        by_centroid.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let probed = by_centroid
            .iter()
            .take(self.probes)
            .flat_map(|&(ci, _)| self.assignments[ci].iter())
            .chain(self.unclustered.iter());
        let candidates = probed.filter_map(|id| self.vectors.get(id).map(|v| (*id, v.as_slice())));

        Ok(rank(query, candidates, k))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

fn is_zero(vec: &[f32]) -> bool {
    vec.iter().all(|&x| x == 0.0)
}

fn nearest(centroids: &[Vec<f32>], vec: &[f32]) -> usize {
    let mut best = 0;
    let mut best_sim = f32::NEG_INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let sim = cosine_similarity(vec, centroid);
        if sim > best_sim {
            best_sim = sim;
            best = i;
        }
    }
    best
}
