//! Retrieval confidence gate.

use serde::{Deserialize, Serialize};

use crate::domain::{ErrorCode, RetrievedChunk};

/// Outcome of the confidence gate for one ranked chunk sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceVerdict {
    pub passed: bool,
    /// Effective score of the top-ranked chunk, if any chunk was retrieved.
    pub top_score: Option<f64>,
    /// Mean effective score over all chunks; informational.
    pub average_relevance: f64,
    /// Set whenever `passed` is false.
    pub code: Option<ErrorCode>,
}

/// Gate generation on the top-ranked chunk's score.
///
/// Empty sequences and top scores below `threshold` both fail with
/// `RETRIEVAL_EMPTY`: either way there is not enough evidence to answer.
/// A chunk without a score counts as fully confident.
pub fn evaluate_confidence(chunks: &[RetrievedChunk], threshold: f64) -> ConfidenceVerdict {
    let average = average_relevance(chunks);

    let Some(top) = chunks.first() else {
        return ConfidenceVerdict {
            passed: false,
            top_score: None,
            average_relevance: average,
            code: Some(ErrorCode::RetrievalEmpty),
        };
    };

    let top_score = top.effective_score();
    let passed = top_score >= threshold;

    ConfidenceVerdict {
        passed,
        top_score: Some(top_score),
        average_relevance: average,
        code: (!passed).then_some(ErrorCode::RetrievalEmpty),
    }
}

/// Mean effective score over `chunks`; `0.0` for an empty sequence.
pub fn average_relevance(chunks: &[RetrievedChunk]) -> f64 {
    if chunks.is_empty() {
        return 0.0;
    }
    let total: f64 = chunks.iter().map(RetrievedChunk::effective_score).sum();
    total / chunks.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(score: Option<f64>) -> RetrievedChunk {
        let c = RetrievedChunk::new("Stop at the line.", "handbook.pdf");
        match score {
            Some(s) => c.with_score(s),
            None => c,
        }
    }

    #[test]
    fn test_empty_fails_with_retrieval_empty() {
        let v = evaluate_confidence(&[], 0.7);
        assert!(!v.passed);
        assert_eq!(v.code, Some(ErrorCode::RetrievalEmpty));
        assert_eq!(v.average_relevance, 0.0);
        assert!(v.top_score.is_none());
    }

    #[test]
    fn test_only_top_score_is_gated() {
        let chunks = vec![chunk(Some(0.5)), chunk(Some(0.95)), chunk(Some(0.99))];
        let v = evaluate_confidence(&chunks, 0.7);
        assert!(!v.passed);
        assert_eq!(v.top_score, Some(0.5));
        assert_eq!(v.code, Some(ErrorCode::RetrievalEmpty));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let v = evaluate_confidence(&[chunk(Some(0.7))], 0.7);
        assert!(v.passed);
        assert!(v.code.is_none());
    }

    #[test]
    fn test_missing_scores_count_as_full_confidence() {
        let chunks = vec![chunk(None), chunk(Some(0.5))];
        let v = evaluate_confidence(&chunks, 0.7);
        assert!(v.passed);
        assert_eq!(v.top_score, Some(1.0));
        assert!((v.average_relevance - 0.75).abs() < 1e-9);
    }
}
