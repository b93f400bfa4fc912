use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::time::Duration;

use crate::config::Number;
use crate::document::Document;
use crate::vector_ops::squared_euclidean_simd;

/// A stored entry matched by a search, borrowed from the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit<'a> {
    /// Insertion position of the entry.
    pub position: usize,
    /// Squared Euclidean distance to the query.
    pub distance: Number,
    pub chunk: &'a Document,
}

impl SearchHit<'_> {
    pub fn to_retrieved(&self) -> Retrieved {
        Retrieved {
            position: self.position,
            distance: Some(self.distance),
            document: self.chunk.clone(),
        }
    }
}

/// Owned retrieval result, detached from whatever produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieved {
    pub position: usize,
    /// `None` for retrievers that do not rank by distance.
    pub distance: Option<Number>,
    pub document: Document,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SearchTimings {
    pub scan_duration: Duration,
    pub sort_duration: Duration,
    pub total_duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Scored {
    pub distance: Number,
    pub position: usize,
}

/// Nearest first; equal distances fall back to insertion order.
fn compare(a: &Scored, b: &Scored) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}

/// Distances from `query` to every stored vector accepted by `keep`.
pub(crate) fn scan_all<F>(vectors: &[Number], dimensions: usize, query: &[Number], keep: F) -> Vec<Scored>
where
    F: Fn(usize) -> bool + Sync,
{
    vectors
        .par_chunks_exact(dimensions)
        .enumerate()
        .filter(|(position, _)| keep(*position))
        .map(|(position, vector)| Scored {
            distance: squared_euclidean_simd(query, vector),
            position,
        })
        .collect()
}

/// Distances from `query` to the listed positions accepted by `keep`.
pub(crate) fn scan_positions<F>(
    vectors: &[Number],
    dimensions: usize,
    query: &[Number],
    positions: &[usize],
    keep: F,
) -> Vec<Scored>
where
    F: Fn(usize) -> bool + Sync,
{
    positions
        .par_iter()
        .copied()
        .filter(|&position| keep(position))
        .map(|position| {
            let start = position * dimensions;
            Scored {
                distance: squared_euclidean_simd(query, &vectors[start..start + dimensions]),
                position,
            }
        })
        .collect()
}

/// Keep the `top_k` best entries, ordered nearest first.
pub(crate) fn select_top_k(mut scored: Vec<Scored>, top_k: usize) -> Vec<Scored> {
    if top_k == 0 {
        return Vec::new();
    }
    if top_k < scored.len() {
        scored.select_nth_unstable_by(top_k, compare);
        scored.truncate(top_k);
    }
    scored.sort_unstable_by(compare);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(pairs: &[(Number, usize)]) -> Vec<Scored> {
        pairs
            .iter()
            .map(|&(distance, position)| Scored { distance, position })
            .collect()
    }

    fn positions(scored: &[Scored]) -> Vec<usize> {
        scored.iter().map(|s| s.position).collect()
    }

    #[test]
    fn ties_prefer_earlier_insertions() {
        let input = scored(&[(1.0, 3), (1.0, 0), (0.5, 2), (1.0, 1)]);
        assert_eq!(positions(&select_top_k(input, 3)), vec![2, 0, 1]);
    }

    #[test]
    fn top_k_larger_than_input_returns_everything_sorted() {
        let input = scored(&[(3.0, 0), (1.0, 1), (2.0, 2)]);
        assert_eq!(positions(&select_top_k(input, 10)), vec![1, 2, 0]);
    }

    #[test]
    fn zero_top_k_is_empty() {
        let input = scored(&[(3.0, 0)]);
        assert!(select_top_k(input, 0).is_empty());
    }

    #[test]
    fn scan_respects_keep_predicate() {
        let vectors = [0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let all = scan_all(&vectors, 2, &[0.0, 0.0], |_| true);
        assert_eq!(all.len(), 3);
        let odd = scan_all(&vectors, 2, &[0.0, 0.0], |p| p % 2 == 1);
        assert_eq!(positions(&odd), vec![1]);
        assert_eq!(odd[0].distance, 2.0);

        let picked = scan_positions(&vectors, 2, &[2.0, 2.0], &[0, 2], |_| true);
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().any(|s| s.position == 2 && s.distance == 0.0));
    }
}
