
//! Jaccard similarity between bottom-n sketches.
//!
//! Sketches are sorted ascending, so the intersection of two sketches is found with a
//! single sorted merge in O(n). Duplicate hashes within a sketch count once, giving set
//! semantics.

use itertools::{EitherOrBoth, Itertools};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::hashing::ItemHash;

/// Percentage similarity of one query against every reference, in reference order.
pub type SimilarityVector = Vec<f64>;

/// One `SimilarityVector` per query, in query order.
pub type SimilarityMatrix = Vec<SimilarityVector>;

/// Jaccard similarity of two sorted hash sets, in [0, 1].
///
/// Two empty sketches have no defined similarity; 0 is returned for this case.
pub fn jaccard(a: &[ItemHash], b: &[ItemHash]) -> f64 {
    debug_assert!(a.is_sorted() && b.is_sorted());

    let mut intersection = 0usize;
    let mut union = 0usize;
    for pair in a.iter().dedup().merge_join_by(b.iter().dedup(), |x, y| x.cmp(y)) {
        if let EitherOrBoth::Both(_, _) = pair {
            intersection += 1;
        }
        union += 1;
    }

    if union == 0 {
        return 0.0;
    }

    intersection as f64 / union as f64
}

/// Similarity of a query sketch to each reference sketch, as a percentage.
pub fn similarity_vector<S: AsRef<[ItemHash]>>(query: &[ItemHash], references: &[S]) -> SimilarityVector {
    references
        .iter()
        .map(|reference| jaccard(query, reference.as_ref()) * 100.0)
        .collect()
}

/// Similarity of every query sketch to every reference sketch, as a percentage.
///
/// Rows follow query order and columns follow reference order.
pub fn similarity_matrix<Q, R>(queries: &[Q], references: &[R]) -> SimilarityMatrix
where
    Q: AsRef<[ItemHash]> + Sync,
    R: AsRef<[ItemHash]> + Sync,
{
    queries
        .par_iter()
        .map(|query| similarity_vector(query.as_ref(), references))
        .collect()
}
