//! Append-only store of (vector, chunk) pairs with nearest-neighbor search.
//!
//! Vectors live back to back in one flat buffer; entry `i` occupies
//! `vectors[i * dimensions..(i + 1) * dimensions]` and pairs with `chunks[i]`.
//! The two collections always describe the same number of entries.

use std::time::Instant;

use crate::ann::{AnnConfig, AnnIndex};
use crate::config::{Number, SearchMethod, State};
use crate::document::{Document, MetadataFilter};
use crate::error::{RagError, Result};
use crate::search::{scan_all, scan_positions, select_top_k, SearchHit, SearchTimings};

pub struct VectorIndex {
    dimensions: usize,
    vectors: Vec<Number>,
    chunks: Vec<Document>,
    ann: Option<AnnIndex>,
}

impl VectorIndex {
    /// Exact-search index for vectors of length `dimensions`.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::invalid_config("dimensions must be positive"));
        }
        Ok(Self {
            dimensions,
            vectors: Vec::new(),
            chunks: Vec::new(),
            ann: None,
        })
    }

    /// Index that also maintains a random-projection LSH side index for
    /// [`search_approximate`](Self::search_approximate). `search` stays exact.
    pub fn with_ann(dimensions: usize, config: AnnConfig) -> Result<Self> {
        let mut index = Self::new(dimensions)?;
        index.ann = Some(AnnIndex::new(dimensions, config));
        Ok(index)
    }

    pub fn from_state(state: &State) -> Result<Self> {
        match state.search_method {
            SearchMethod::Exact => Self::new(state.dimensions),
            SearchMethod::Ann => Self::with_ann(
                state.dimensions,
                AnnConfig {
                    num_projections: state.ann_num_projections,
                    num_tables: state.ann_num_tables,
                },
            ),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn search_method(&self) -> SearchMethod {
        if self.ann.is_some() {
            SearchMethod::Ann
        } else {
            SearchMethod::Exact
        }
    }

    pub fn get(&self, position: usize) -> Option<(&[Number], &Document)> {
        let chunk = self.chunks.get(position)?;
        let start = position * self.dimensions;
        Some((&self.vectors[start..start + self.dimensions], chunk))
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Document> {
        self.chunks.iter()
    }

    /// Append `vectors[i]` paired with `chunks[i]` for every `i`.
    ///
    /// The batch is validated as a whole first; on error nothing is stored.
    pub fn add<V, C>(&mut self, vectors: &[V], chunks: Vec<C>) -> Result<()>
    where
        V: AsRef<[Number]>,
        C: Into<Document>,
    {
        if vectors.len() != chunks.len() {
            return Err(RagError::LengthMismatch {
                vectors: vectors.len(),
                chunks: chunks.len(),
            });
        }
        for vector in vectors {
            RagError::check_dimensions(self.dimensions, vector.as_ref().len())?;
        }

        let first_new = self.len();
        self.vectors.reserve(vectors.len() * self.dimensions);
        for vector in vectors {
            self.vectors.extend_from_slice(vector.as_ref());
        }
        self.chunks.extend(chunks.into_iter().map(Into::into));
        debug_assert_eq!(self.vectors.len(), self.chunks.len() * self.dimensions);

        if let Some(ann) = &mut self.ann {
            ann.extend(&self.vectors, first_new);
        }

        tracing::debug!(added = vectors.len(), total = self.len(), "indexed vectors");
        Ok(())
    }

    /// The `top_k` stored chunks nearest to `query` by squared Euclidean
    /// distance, nearest first, earlier insertions winning ties.
    ///
    /// An empty index, or `top_k == 0`, yields an empty result rather than an
    /// error. Fewer than `top_k` entries yields all of them.
    pub fn search(&self, query: &[Number], top_k: usize) -> Result<Vec<SearchHit<'_>>> {
        self.search_with_timings(query, top_k, None)
            .map(|(hits, _)| hits)
    }

    /// Like [`search`](Self::search), considering only chunks whose metadata
    /// satisfies `filter`.
    pub fn search_filtered(
        &self,
        query: &[Number],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchHit<'_>>> {
        self.search_with_timings(query, top_k, Some(filter))
            .map(|(hits, _)| hits)
    }

    pub fn search_with_timings(
        &self,
        query: &[Number],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<(Vec<SearchHit<'_>>, SearchTimings)> {
        self.run_search(query, top_k, filter, SearchMethod::Exact)
    }

    /// Rank only the chunks the LSH side index puts in the query's buckets.
    ///
    /// Results may miss true neighbors. When the buckets hold fewer than
    /// `top_k` usable candidates, or the index was built without ANN, this
    /// is an exact scan.
    pub fn search_approximate(
        &self,
        query: &[Number],
        top_k: usize,
    ) -> Result<Vec<SearchHit<'_>>> {
        self.run_search(query, top_k, None, SearchMethod::Ann)
            .map(|(hits, _)| hits)
    }

    pub fn search_approximate_filtered(
        &self,
        query: &[Number],
        top_k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<SearchHit<'_>>> {
        self.run_search(query, top_k, Some(filter), SearchMethod::Ann)
            .map(|(hits, _)| hits)
    }

    /// Search the way this index was configured to: exact, or through the
    /// LSH side index when built with ANN.
    pub fn search_configured(
        &self,
        query: &[Number],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<(Vec<SearchHit<'_>>, SearchTimings)> {
        self.run_search(query, top_k, filter, self.search_method())
    }

    fn run_search(
        &self,
        query: &[Number],
        top_k: usize,
        filter: Option<&MetadataFilter>,
        method: SearchMethod,
    ) -> Result<(Vec<SearchHit<'_>>, SearchTimings)> {
        RagError::check_dimensions(self.dimensions, query.len())?;
        let start = Instant::now();
        let mut timings = SearchTimings::default();

        if self.is_empty() || top_k == 0 {
            tracing::debug!(entries = self.len(), top_k, "nothing to search");
            return Ok((Vec::new(), timings));
        }

        let filter = filter.filter(|f| !f.is_empty());
        let keep = |position: usize| match filter {
            Some(filter) => filter.matches(&self.chunks[position].metadata),
            None => true,
        };

        let scan_start = Instant::now();
        let scored = match (method, &self.ann) {
            (SearchMethod::Ann, Some(ann)) => {
                let candidates = ann.candidates(query);
                let scored =
                    scan_positions(&self.vectors, self.dimensions, query, &candidates, keep);
                if scored.len() < top_k {
                    tracing::debug!(
                        found = scored.len(),
                        top_k,
                        "ann found fewer than top_k candidates, falling back to exact scan"
                    );
                    scan_all(&self.vectors, self.dimensions, query, keep)
                } else {
                    scored
                }
            }
            _ => scan_all(&self.vectors, self.dimensions, query, keep),
        };
        timings.scan_duration = scan_start.elapsed();

        let sort_start = Instant::now();
        let ranked = select_top_k(scored, top_k);
        timings.sort_duration = sort_start.elapsed();

        let hits: Vec<SearchHit<'_>> = ranked
            .into_iter()
            .map(|s| SearchHit {
                position: s.position,
                distance: s.distance,
                chunk: &self.chunks[s.position],
            })
            .collect();
        timings.total_duration = start.elapsed();

        tracing::debug!(
            %method,
            results = hits.len(),
            top_k,
            elapsed = ?timings.total_duration,
            "search completed"
        );
        Ok((hits, timings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn texts<'a>(hits: &'a [SearchHit<'a>]) -> Vec<&'a str> {
        hits.iter().map(|h| h.chunk.text.as_str()).collect()
    }

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new(3).unwrap();
        index
            .add(
                &[[0.0f32, 0.0, 0.0], [1.0, 1.0, 1.0], [5.0, 5.0, 5.0]],
                vec!["a", "b", "c"],
            )
            .unwrap();
        index
    }

    #[test]
    fn nearest_two_of_three() {
        let index = sample_index();
        let hits = index.search(&[0.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(texts(&hits), vec!["a", "b"]);
        assert_eq!(hits[0].distance, 0.0);
        assert_eq!(hits[1].distance, 3.0);
    }

    #[test]
    fn exact_match_comes_first() {
        let index = sample_index();
        for (position, vector) in [[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [5.0, 5.0, 5.0]]
            .iter()
            .enumerate()
        {
            let hits = index.search(vector, 1).unwrap();
            assert_eq!(hits[0].position, position);
            assert_eq!(hits[0].distance, 0.0);
        }
    }

    #[test]
    fn result_length_is_min_of_top_k_and_len() {
        let index = sample_index();
        for top_k in 0..6 {
            let hits = index.search(&[2.0, 2.0, 2.0], top_k).unwrap();
            assert_eq!(hits.len(), top_k.min(3));
        }
    }

    #[test]
    fn ties_go_to_earlier_insertions() {
        let mut index = VectorIndex::new(2).unwrap();
        index
            .add(&[[1.0f32, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0]], vec!["e", "n", "w", "s"])
            .unwrap();
        let hits = index.search(&[0.0, 0.0], 4).unwrap();
        assert_eq!(texts(&hits), vec!["e", "n", "w", "s"]);
    }

    #[test]
    fn search_is_idempotent() {
        let index = sample_index();
        let first = index.search(&[0.5, 2.0, 3.0], 3).unwrap();
        let second = index.search(&[0.5, 2.0, 3.0], 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = VectorIndex::new(4).unwrap();
        assert!(index.search(&[0.0; 4], 5).unwrap().is_empty());
    }

    #[test]
    fn add_rejects_wrong_dimension_without_storing() {
        let mut index = sample_index();
        let err = index
            .add(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0]], vec!["x", "y"])
            .unwrap_err();
        assert_eq!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn add_rejects_count_mismatch() {
        let mut index = VectorIndex::new(3).unwrap();
        let err = index.add(&[[0.0f32; 3], [1.0; 3]], vec!["only one"]).unwrap_err();
        assert_eq!(
            err,
            RagError::LengthMismatch {
                vectors: 2,
                chunks: 1
            }
        );
        assert!(index.is_empty());
    }

    #[test]
    fn search_rejects_wrong_query_dimension() {
        let index = sample_index();
        assert!(matches!(
            index.search(&[0.0, 0.0], 1),
            Err(RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        let empty = VectorIndex::new(3).unwrap();
        assert!(empty.search(&[0.0], 1).is_err());
    }

    #[test]
    fn zero_dimensions_is_invalid() {
        assert!(matches!(
            VectorIndex::new(0),
            Err(RagError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn filtered_search_skips_non_matching_chunks() {
        let mut index = VectorIndex::new(2).unwrap();
        index
            .add(
                &[[0.0f32, 0.0], [0.1, 0.0], [0.2, 0.0]],
                vec![
                    Document::new("wiki").with_metadata("topic", "Transformers"),
                    Document::new("blog").with_metadata("topic", "RAG"),
                    Document::new("paper").with_metadata("topic", "RAG"),
                ],
            )
            .unwrap();
        let filter = MetadataFilter::new().require("topic", "RAG");
        let hits = index.search_filtered(&[0.0, 0.0], 5, &filter).unwrap();
        assert_eq!(texts(&hits), vec!["blog", "paper"]);
    }

    #[test]
    fn get_returns_the_stored_pair() {
        let index = sample_index();
        let (vector, chunk) = index.get(2).unwrap();
        assert_eq!(vector, &[5.0, 5.0, 5.0]);
        assert_eq!(chunk.text, "c");
        assert!(index.get(3).is_none());
    }

    #[test]
    fn approximate_search_keeps_exact_neighbor_and_result_length() {
        let dim = 8;
        let mut index = VectorIndex::with_ann(dim, AnnConfig::default()).unwrap();
        let vectors: Vec<Vec<Number>> = (0..64)
            .map(|i| (0..dim).map(|d| ((i * 7 + d * 3) % 11) as Number - 5.0).collect())
            .collect();
        let chunks: Vec<String> = (0..64).map(|i| format!("chunk-{i}")).collect();
        index.add(&vectors, chunks).unwrap();
        assert_eq!(index.search_method(), SearchMethod::Ann);

        let hits = index.search_approximate(&vectors[10], 5).unwrap();
        assert_eq!(hits.len(), 5);
        assert_eq!(hits[0].distance, 0.0);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

        let everything = index.search_approximate(&vectors[10], 100).unwrap();
        assert_eq!(everything.len(), 64);
    }

    fn random_vectors(count: usize, dim: usize, seed: u64) -> Vec<Vec<Number>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect()
    }

    #[test]
    fn search_is_exact_even_when_built_with_ann() {
        let dim = 32;
        let vectors = random_vectors(1000, dim, 7);
        let queries = random_vectors(10, dim, 8);
        let chunks: Vec<String> = (0..vectors.len()).map(|i| i.to_string()).collect();

        let mut exact = VectorIndex::new(dim).unwrap();
        exact.add(&vectors, chunks.clone()).unwrap();
        let mut ann = VectorIndex::with_ann(dim, AnnConfig::default()).unwrap();
        ann.add(&vectors, chunks).unwrap();

        fn positions(hits: Vec<SearchHit<'_>>) -> Vec<usize> {
            hits.iter().map(|h| h.position).collect()
        }
        let filter = MetadataFilter::new();
        for query in &queries {
            let expected = positions(exact.search(query, 5).unwrap());
            assert_eq!(positions(ann.search(query, 5).unwrap()), expected);
            assert_eq!(
                positions(ann.search_filtered(query, 5, &filter).unwrap()),
                expected
            );
            let (timed, _) = ann.search_with_timings(query, 5, None).unwrap();
            assert_eq!(positions(timed), expected);
        }
    }

    #[test]
    fn approximate_search_without_ann_is_exact() {
        let index = sample_index();
        assert_eq!(
            index.search_approximate(&[0.0, 0.0, 0.0], 2).unwrap(),
            index.search(&[0.0, 0.0, 0.0], 2).unwrap()
        );
    }

    fn tagged_index(ann: bool) -> VectorIndex {
        let dim = 4;
        let mut index = if ann {
            VectorIndex::with_ann(dim, AnnConfig::default()).unwrap()
        } else {
            VectorIndex::new(dim).unwrap()
        };
        let vectors = random_vectors(200, dim, 11);
        let chunks: Vec<Document> = (0..vectors.len())
            .map(|i| {
                let tag = if i % 50 == 3 { "rare" } else { "common" };
                Document::new(format!("chunk-{i}")).with_metadata("tag", tag)
            })
            .collect();
        index.add(&vectors, chunks).unwrap();
        index
    }

    #[test]
    fn sparse_filter_returns_every_match_on_exact_path() {
        let index = tagged_index(false);
        let filter = MetadataFilter::new().require("tag", "rare");
        let hits = index.search_filtered(&[0.0; 4], 10, &filter).unwrap();
        assert_eq!(hits.len(), 4);
        assert!(hits
            .iter()
            .all(|h| h.chunk.metadata.get("tag") == Some("rare")));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn sparse_filter_falls_back_to_exact_scan_on_ann_path() {
        let index = tagged_index(true);
        let exact = tagged_index(false);
        let filter = MetadataFilter::new().require("tag", "rare");
        for top_k in [1, 4, 10] {
            let hits = index
                .search_approximate_filtered(&[0.0; 4], top_k, &filter)
                .unwrap();
            assert_eq!(hits.len(), top_k.min(4));
            assert!(hits
                .iter()
                .all(|h| h.chunk.metadata.get("tag") == Some("rare")));
        }
        let approximate: Vec<usize> = index
            .search_approximate_filtered(&[0.0; 4], 10, &filter)
            .unwrap()
            .iter()
            .map(|h| h.position)
            .collect();
        let expected: Vec<usize> = exact
            .search_filtered(&[0.0; 4], 10, &filter)
            .unwrap()
            .iter()
            .map(|h| h.position)
            .collect();
        assert_eq!(approximate, expected);
    }
}
