use crate::config::Number;
use crate::error::{Error, Result};
use crate::store::VectorStore;
use crate::vector_entry::VectorEntry;
use crate::vector_ops::compute_cosine_similarity_simd;
use log::debug;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct SimilarityResult {
    pub entry: Arc<VectorEntry>,
    /// Cosine similarity in `[-1, 1]`.
    pub similarity: Number,
}

impl VectorStore {
    /// Rank stored entries against `query_embedding`.
    ///
    /// Entries scoring strictly below `threshold` are dropped, the rest are
    /// sorted by similarity (ties broken by file name, chunk index, then id)
    /// and cut to `top_k`. Every compared embedding must have the query's
    /// length, otherwise the search fails with [`Error::DimensionMismatch`].
    pub fn similarity_search(
        &self,
        query_embedding: &[Number],
        top_k: usize,
        threshold: Number,
        file_name_filter: Option<&str>,
    ) -> Result<Vec<SimilarityResult>> {
        let start = Instant::now();
        let candidates = self.snapshot(file_name_filter);
        let candidate_count = candidates.len();

        let scored = candidates
            .into_par_iter()
            .map(|entry| compute_similarity(query_embedding, entry))
            .collect::<Result<Vec<_>>>()?;

        let results = sort_and_limit_results(
            scored
                .into_iter()
                .filter(|result| result.similarity >= threshold)
                .collect(),
            top_k,
        );

        debug!(
            "Similarity search over {} candidates (filter: {:?}) kept {} results in {:?}",
            candidate_count,
            file_name_filter,
            results.len(),
            start.elapsed()
        );
        Ok(results)
    }
}

fn compute_similarity(query_vector: &[Number], entry: Arc<VectorEntry>) -> Result<SimilarityResult> {
    match compute_cosine_similarity_simd(query_vector, &entry.embedding) {
        Some(similarity) => Ok(SimilarityResult { entry, similarity }),
        None => Err(Error::DimensionMismatch {
            id: entry.id.clone(),
            expected: query_vector.len(),
            actual: entry.embedding.len(),
        }),
    }
}

fn compare_results(a: &SimilarityResult, b: &SimilarityResult) -> Ordering {
    b.similarity
        .total_cmp(&a.similarity)
        .then_with(|| a.entry.file_name().cmp(b.entry.file_name()))
        .then_with(|| a.entry.chunk_index().cmp(&b.entry.chunk_index()))
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}

fn sort_and_limit_results(mut results: Vec<SimilarityResult>, limit: usize) -> Vec<SimilarityResult> {
    results.sort_by(compare_results);
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::add;

    fn sample_store() -> VectorStore {
        let store = VectorStore::new();
        add(&store, "A.txt", 0, vec![1.0, 0.0, 0.0]);
        add(&store, "A.txt", 1, vec![0.9, 0.1, 0.0]);
        add(&store, "A.txt", 2, vec![0.0, 1.0, 0.0]);
        add(&store, "B.txt", 0, vec![1.0, 0.05, 0.0]);
        add(&store, "B.txt", 1, vec![-1.0, 0.0, 0.0]);
        store
    }

    fn ids(results: &[SimilarityResult]) -> Vec<String> {
        results.iter().map(|r| r.entry.id.clone()).collect()
    }

    #[test]
    fn test_results_sorted_descending_and_limited() {
        let store = sample_store();
        let results = store
            .similarity_search(&[1.0, 0.0, 0.0], 3, -1.0, None)
            .unwrap();

        assert_eq!(ids(&results), vec!["A.txt-chunk-0", "B.txt-chunk-0", "A.txt-chunk-1"]);
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn test_threshold_exclusion() {
        let store = sample_store();
        let results = store
            .similarity_search(&[1.0, 0.0, 0.0], 10, 0.5, None)
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.similarity >= 0.5));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let store = VectorStore::new();
        add(&store, "a.txt", 0, vec![1.0, 0.0]);
        let results = store.similarity_search(&[3.0, 0.0], 5, 1.0, None).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_file_name_filter() {
        let store = sample_store();
        let results = store
            .similarity_search(&[1.0, 0.0, 0.0], 5, 0.1, Some("A.txt"))
            .unwrap();

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.entry.file_name() == "A.txt"));
    }

    #[test]
    fn test_search_is_deterministic() {
        let store = VectorStore::new();
        for i in 0..20 {
            add(&store, "same.txt", i, vec![2.0, 2.0]);
        }
        let first = store.similarity_search(&[1.0, 1.0], 7, 0.0, None).unwrap();
        let second = store.similarity_search(&[1.0, 1.0], 7, 0.0, None).unwrap();

        assert_eq!(ids(&first), ids(&second));
        let indices: Vec<usize> = first.iter().map(|r| r.entry.chunk_index()).collect();
        assert_eq!(indices, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_query_scores_zero() {
        let store = sample_store();
        let results = store
            .similarity_search(&[0.0, 0.0, 0.0], 10, -1.0, None)
            .unwrap();

        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.similarity == 0.0));
    }

    #[test]
    fn test_dimension_mismatch() {
        let store = sample_store();
        add(&store, "C.txt", 0, vec![1.0, 0.0]);

        let err = store
            .similarity_search(&[1.0, 0.0, 0.0], 5, 0.0, None)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { expected: 3, actual: 2, .. }
        ));

        // Entries outside the filter are never compared.
        assert!(store
            .similarity_search(&[1.0, 0.0, 0.0], 5, 0.0, Some("A.txt"))
            .is_ok());
    }

    #[test]
    fn test_zero_top_k() {
        let store = sample_store();
        assert!(store
            .similarity_search(&[1.0, 0.0, 0.0], 0, -1.0, None)
            .unwrap()
            .is_empty());
    }
}
