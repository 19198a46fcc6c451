//! Nearest-neighbour ranking over a bounded candidate window.
//!
//! Stores fetch a capped, recency-ordered pool of vectors and hand it to a
//! [`SimilarityIndex`], which returns the best `k`. The only implementation
//! today is [`BruteForceCosine`]; an index-backed structure can replace it
//! without changing any store or caller.

use crate::embedding::cosine_similarity;

/// A stored vector offered for ranking.
#[derive(Debug, Clone)]
pub struct VectorCandidate {
    pub item_id: String,
    pub vector: Vec<f32>,
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub item_id: String,
    pub score: f32,
}

pub trait SimilarityIndex: Send + Sync {
    /// Return at most `k` candidates, best first.
    fn top_k(&self, candidates: &[VectorCandidate], query: &[f32], k: usize) -> Vec<ScoredItem>;
}

/// Scores every candidate with cosine similarity.
///
/// Sorting is stable, so among equal scores the candidate that came first
/// (the more recently embedded one) wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceCosine;

impl SimilarityIndex for BruteForceCosine {
    fn top_k(&self, candidates: &[VectorCandidate], query: &[f32], k: usize) -> Vec<ScoredItem> {
        if k == 0 || query.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<ScoredItem> = candidates
            .iter()
            .map(|c| ScoredItem {
                item_id: c.item_id.clone(),
                score: cosine_similarity(query, &c.vector),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }
}

/// Convenience wrapper over [`BruteForceCosine`].
pub fn similarity_search(candidates: &[VectorCandidate], query: &[f32], k: usize) -> Vec<ScoredItem> {
    BruteForceCosine.top_k(candidates, query, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(id: &str, v: &[f32]) -> VectorCandidate {
        VectorCandidate {
            item_id: id.to_string(),
            vector: v.to_vec(),
        }
    }

    #[test]
    fn test_ranks_by_similarity() {
        let cands = vec![
            cand("far", &[0.0, 1.0]),
            cand("near", &[1.0, 0.1]),
            cand("exact", &[1.0, 0.0]),
        ];
        let out = similarity_search(&cands, &[1.0, 0.0], 2);
        let ids: Vec<&str> = out.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!((out[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let cands = vec![cand("recent", &[1.0, 0.0]), cand("older", &[2.0, 0.0])];
        let out = similarity_search(&cands, &[1.0, 0.0], 2);
        assert_eq!(out[0].item_id, "recent");
        assert_eq!(out[1].item_id, "older");
    }

    #[test]
    fn test_zero_k_and_empty_query() {
        let cands = vec![cand("a", &[1.0])];
        assert!(similarity_search(&cands, &[1.0], 0).is_empty());
        assert!(similarity_search(&cands, &[], 3).is_empty());
    }

    #[test]
    fn test_mismatched_dimensions_score_zero() {
        let cands = vec![cand("short", &[1.0]), cand("ok", &[0.5, 0.5])];
        let out = similarity_search(&cands, &[1.0, 0.0], 2);
        assert_eq!(out[0].item_id, "ok");
        assert_eq!(out[1].score, 0.0);
    }
}
