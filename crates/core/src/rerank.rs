use crate::models::RetrievedResult;

/// Reduces a retrieved candidate set to the best K, descending by
/// relevance. Kept as a trait so a cross-encoder or LLM re-ranker can be
/// swapped in without touching callers.
pub trait Reranker {
    fn select_top_k(&self, results: Vec<RetrievedResult>, k: usize) -> Vec<RetrievedResult>;
}

/// Default re-ranker: stable sort on `score` descending, truncate to K.
/// The stable sort keeps ties in their original retrieval order so output
/// is reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreReranker;

impl Reranker for ScoreReranker {
    fn select_top_k(&self, mut results: Vec<RetrievedResult>, k: usize) -> Vec<RetrievedResult> {
        results.sort_by(|left, right| right.score.total_cmp(&left.score));
        results.truncate(k);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(chunk_id: &str, score: f64) -> RetrievedResult {
        RetrievedResult {
            chunk_id: chunk_id.to_string(),
            document_id: "doc-1".to_string(),
            document_title: "Manual".to_string(),
            content: "content".to_string(),
            page_number: 1,
            section_title: String::new(),
            score,
            relevance_score: score,
        }
    }

    #[test]
    fn selects_highest_scores_in_descending_order() {
        let reranker = ScoreReranker;
        let results = vec![result("a", 0.2), result("b", 0.9), result("c", 0.5)];

        let top = reranker.select_top_k(results, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].chunk_id, "b");
        assert_eq!(top[1].chunk_id, "c");
    }

    #[test]
    fn output_length_is_min_of_k_and_input() {
        let reranker = ScoreReranker;
        assert_eq!(reranker.select_top_k(Vec::new(), 5).len(), 0);
        assert_eq!(
            reranker.select_top_k(vec![result("a", 1.0)], 5).len(),
            1
        );
    }

    #[test]
    fn selection_is_idempotent() {
        let reranker = ScoreReranker;
        let results = vec![
            result("a", 0.7),
            result("b", 0.1),
            result("c", 0.7),
            result("d", 0.4),
        ];

        let once = reranker.select_top_k(results.clone(), 3);
        let twice = reranker.select_top_k(once.clone(), 3);

        let ids = |set: &[RetrievedResult]| {
            set.iter().map(|r| r.chunk_id.clone()).collect::<Vec<_>>()
        };
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn ties_keep_retrieval_order() {
        let reranker = ScoreReranker;
        let results = vec![result("first", 0.5), result("second", 0.5)];
        let top = reranker.select_top_k(results, 2);
        assert_eq!(top[0].chunk_id, "first");
        assert_eq!(top[1].chunk_id, "second");
    }
}
