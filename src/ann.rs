//! Random-hyperplane LSH used to narrow the candidate set for approximate
//! search. Candidates are always re-ranked by exact distance afterwards.

use rand::prelude::*;
use rand_distr::StandardNormal;
use std::collections::HashMap;

use crate::config::Number;
use crate::vector_ops::dot_simd;

const SEED: u64 = 42;
const MIN_PROJECTIONS: usize = 2;
const MAX_PROJECTIONS: usize = 16;
const MIN_TABLES: usize = 1;
const MAX_TABLES: usize = 8;
/// Auto-sized indexes are rebuilt whenever the entry count doubles past this.
const MIN_REBUILD_SIZE: usize = 16;

/// Hash shape. `None` fields are derived from the number of stored entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnnConfig {
    pub num_projections: Option<usize>,
    pub num_tables: Option<usize>,
}

impl AnnConfig {
    fn is_auto(&self) -> bool {
        self.num_projections.is_none() || self.num_tables.is_none()
    }

    fn resolve(&self, data_size: usize) -> (usize, usize) {
        let (projections, tables) = calculate_params(data_size);
        (
            // One hash bit per projection in a u64.
            self.num_projections.unwrap_or(projections).clamp(1, 64),
            self.num_tables.unwrap_or(tables).max(1),
        )
    }
}

fn calculate_params(data_size: usize) -> (usize, usize) {
    let log_size = (data_size.max(1) as f64).log2() as usize;
    let num_projections = (log_size + 2).clamp(MIN_PROJECTIONS, MAX_PROJECTIONS);
    let num_tables = (log_size / 2 + 2).clamp(MIN_TABLES, MAX_TABLES);
    (num_projections, num_tables)
}

pub struct RandomProjectionIndex {
    dimensions: usize,
    random_vectors: Vec<Vec<Number>>,
    hash_tables: Vec<HashMap<u64, Vec<usize>>>,
    num_projections: usize,
}

impl RandomProjectionIndex {
    pub fn new(dimensions: usize, num_projections: usize, num_tables: usize) -> Self {
        tracing::debug!(num_projections, num_tables, "building random projections");

        let mut rng = StdRng::seed_from_u64(SEED);
        let random_vectors: Vec<Vec<Number>> = (0..num_tables * num_projections)
            .map(|_| {
                (0..dimensions)
                    .map(|_| rng.sample::<Number, _>(StandardNormal))
                    .collect()
            })
            .collect();

        Self {
            dimensions,
            random_vectors,
            hash_tables: vec![HashMap::new(); num_tables],
            num_projections,
        }
    }

    pub fn num_tables(&self) -> usize {
        self.hash_tables.len()
    }

    pub fn num_projections(&self) -> usize {
        self.num_projections
    }

    fn hash_vector(&self, vector: &[Number], table_index: usize) -> u64 {
        let start = table_index * self.num_projections;
        let end = start + self.num_projections;

        self.random_vectors[start..end]
            .iter()
            .map(|rv| dot_simd(rv, vector))
            .enumerate()
            .fold(0u64, |acc, (i, proj)| {
                if proj >= 0.0 {
                    acc | (1 << i)
                } else {
                    acc
                }
            })
    }

    pub fn add(&mut self, vector: &[Number], position: usize) {
        for table in 0..self.hash_tables.len() {
            let hash = self.hash_vector(vector, table);
            self.hash_tables[table].entry(hash).or_default().push(position);
        }
    }

    /// Positions sharing a bucket with `query` in any table, probing the exact
    /// bucket and every bucket one bit away. Sorted ascending, no duplicates.
    pub fn candidates(&self, query: &[Number]) -> Vec<usize> {
        debug_assert_eq!(query.len(), self.dimensions);
        let mut candidates = Vec::new();

        for (table_index, table) in self.hash_tables.iter().enumerate() {
            let query_hash = self.hash_vector(query, table_index);
            let probes =
                std::iter::once(query_hash).chain((0..self.num_projections).map(|j| query_hash ^ (1 << j)));
            for hash in probes {
                if let Some(bucket) = table.get(&hash) {
                    candidates.extend_from_slice(bucket);
                }
            }
        }

        candidates.sort_unstable();
        candidates.dedup();
        tracing::debug!(count = candidates.len(), "ann candidates");
        candidates
    }
}

/// Keeps a [`RandomProjectionIndex`] in step with an append-only flat vector
/// store, resizing the hash when auto-sized and the store has doubled.
pub struct AnnIndex {
    config: AnnConfig,
    index: RandomProjectionIndex,
    built_for: usize,
}

impl AnnIndex {
    pub fn new(dimensions: usize, config: AnnConfig) -> Self {
        let (projections, tables) = config.resolve(MIN_REBUILD_SIZE);
        Self {
            config,
            index: RandomProjectionIndex::new(dimensions, projections, tables),
            built_for: MIN_REBUILD_SIZE,
        }
    }

    /// Hash the entries at positions `from..` of `vectors`, which holds every
    /// stored vector back to back.
    pub fn extend(&mut self, vectors: &[Number], from: usize) {
        let dimensions = self.index.dimensions;
        let total = vectors.len() / dimensions;

        let start = if self.config.is_auto() && total > self.built_for * 2 {
            let (projections, tables) = self.config.resolve(total);
            tracing::debug!(total, projections, tables, "resizing ann index");
            self.index = RandomProjectionIndex::new(dimensions, projections, tables);
            self.built_for = total;
            0
        } else {
            from
        };

        for (offset, vector) in vectors[start * dimensions..]
            .chunks_exact(dimensions)
            .enumerate()
        {
            self.index.add(vector, start + offset);
        }
    }

    pub fn candidates(&self, query: &[Number]) -> Vec<usize> {
        self.index.candidates(query)
    }

    #[cfg(test)]
    fn shape(&self) -> (usize, usize) {
        (self.index.num_projections(), self.index.num_tables())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Number> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n * dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    #[test]
    fn params_grow_with_data_size() {
        assert_eq!(calculate_params(0), (2, 2));
        let (small_p, _) = calculate_params(16);
        let (large_p, large_t) = calculate_params(1 << 20);
        assert!(large_p > small_p);
        assert_eq!(large_p, MAX_PROJECTIONS);
        assert!(large_t <= MAX_TABLES);
    }

    #[test]
    fn stored_vector_is_its_own_candidate() {
        let dim = 12;
        let vectors = random_vectors(50, dim, 7);
        let mut index = RandomProjectionIndex::new(dim, 6, 3);
        for (i, v) in vectors.chunks_exact(dim).enumerate() {
            index.add(v, i);
        }
        for (i, v) in vectors.chunks_exact(dim).enumerate() {
            assert!(index.candidates(v).binary_search(&i).is_ok());
        }
    }

    #[test]
    fn candidates_are_sorted_and_unique() {
        let dim = 8;
        let vectors = random_vectors(40, dim, 3);
        let mut index = RandomProjectionIndex::new(dim, 3, 4);
        for (i, v) in vectors.chunks_exact(dim).enumerate() {
            index.add(v, i);
        }
        let candidates = index.candidates(&vectors[..dim]);
        assert!(candidates.windows(2).all(|w| w[0] < w[1]));
        assert!(candidates.iter().all(|&c| c < 40));
    }

    #[test]
    fn auto_sized_index_rebuilds_and_keeps_every_entry() {
        let dim = 4;
        let vectors = random_vectors(100, dim, 11);
        let mut ann = AnnIndex::new(dim, AnnConfig::default());
        let initial = ann.shape();

        for batch_end in (10..=100).step_by(10) {
            ann.extend(&vectors[..batch_end * dim], batch_end - 10);
        }

        assert_ne!(ann.shape(), initial);
        for (i, v) in vectors.chunks_exact(dim).enumerate() {
            assert!(ann.candidates(v).contains(&i));
        }
    }

    #[test]
    fn fixed_shape_is_never_resized() {
        let dim = 4;
        let vectors = random_vectors(200, dim, 5);
        let config = AnnConfig {
            num_projections: Some(5),
            num_tables: Some(2),
        };
        let mut ann = AnnIndex::new(dim, config);
        ann.extend(&vectors, 0);
        assert_eq!(ann.shape(), (5, 2));
    }
}
