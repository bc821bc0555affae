//! Cosine similarity ranking over cached chunk embeddings.
//!
//! The candidate sets here are small (one document's chunks), so ranking is
//! a straight scan: score every candidate against the query vector, sort,
//! truncate. No index structure, no approximation.

use crate::embedding_cache::ChunkRecord;
use crate::error::{Result, RetrieveError};
use std::cmp::Ordering;

/// Number of chunks selected for context when the caller does not override it.
pub const DEFAULT_TOP_K: usize = 3;

/// One ranked retrieval result.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Position of the chunk in its document's embedding set
    pub chunk_index: usize,
    /// Chunk text, carried along for prompt assembly
    pub text: String,
    /// Cosine similarity against the query embedding
    pub score: f32,
}

/// Rank `candidates` against `query` and return at most `k` results.
///
/// Results are ordered by score descending; ties break toward the lower
/// chunk index, so the ranking is deterministic for a given input.
///
/// # Returns
/// An empty vector when the query vector or candidate set is empty. An error
/// if any candidate's dimension differs from the query's; no partial ranking
/// is produced in that case.
pub fn top_k(query: &[f32], candidates: &[ChunkRecord], k: usize) -> Result<Vec<ScoredChunk>> {
    if query.is_empty() || candidates.is_empty() {
        return Ok(Vec::new());
    }

    let mut scored = Vec::with_capacity(candidates.len());
    for (chunk_index, chunk) in candidates.iter().enumerate() {
        if chunk.embedding.len() != query.len() {
            return Err(RetrieveError::DimensionMismatch {
                expected: query.len(),
                found: chunk.embedding.len(),
                chunk_index,
            });
        }
        scored.push(ScoredChunk {
            chunk_index,
            text: chunk.text.clone(),
            score: cosine_similarity(query, &chunk.embedding),
        });
    }

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk_index.cmp(&b.chunk_index))
    });
    scored.truncate(k);
    Ok(scored)
}

/// Cosine similarity between two equal-length vectors.
///
/// Returns 0.0 when either vector has zero magnitude rather than dividing
/// by zero.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            text: text.to_string(),
            embedding,
        }
    }

    #[test]
    fn test_ranks_by_descending_similarity() {
        let candidates = vec![
            chunk("opposite", vec![-1.0, 0.0]),
            chunk("orthogonal", vec![0.0, 1.0]),
            chunk("aligned", vec![1.0, 0.0]),
            chunk("nearby", vec![0.6, 0.8]),
        ];

        let ranked = top_k(&[1.0, 0.0], &candidates, 4).unwrap();
        let order: Vec<&str> = ranked.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(order, vec!["aligned", "nearby", "orthogonal", "opposite"]);

        assert_eq!(ranked[0].score, 1.0);
        assert!((ranked[1].score - 0.6).abs() < 1e-6);
        assert_eq!(ranked[2].score, 0.0);
        assert_eq!(ranked[3].score, -1.0);
    }

    #[test]
    fn test_truncates_to_k() {
        let candidates = vec![
            chunk("a", vec![1.0, 0.0]),
            chunk("b", vec![0.9, 0.1]),
            chunk("c", vec![0.0, 1.0]),
        ];

        let ranked = top_k(&[1.0, 0.0], &candidates, 2).unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].text, "a");
    }

    #[test]
    fn test_ties_break_toward_lower_chunk_index() {
        // Identical vectors make every score equal.
        let candidates = vec![
            chunk("first", vec![1.0, 1.0]),
            chunk("second", vec![1.0, 1.0]),
            chunk("third", vec![1.0, 1.0]),
        ];

        let ranked = top_k(&[1.0, 1.0], &candidates, 3).unwrap();
        let indices: Vec<usize> = ranked.iter().map(|r| r.chunk_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_inputs_yield_empty_ranking() {
        let candidates = vec![chunk("a", vec![1.0, 0.0])];
        assert!(top_k(&[], &candidates, 3).unwrap().is_empty());
        assert!(top_k(&[1.0, 0.0], &[], 3).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_is_an_error_naming_the_chunk() {
        let candidates = vec![
            chunk("fine", vec![1.0, 0.0]),
            chunk("short", vec![1.0]),
        ];

        let result = top_k(&[1.0, 0.0], &candidates, 3);
        match result {
            Err(RetrieveError::DimensionMismatch {
                expected,
                found,
                chunk_index,
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
                assert_eq!(chunk_index, 1);
            }
            other => panic!("expected dimension mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        let candidates = vec![chunk("silent", vec![0.0, 0.0])];
        let ranked = top_k(&[1.0, 0.0], &candidates, 1).unwrap();
        assert_eq!(ranked[0].score, 0.0);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let candidates = vec![
            chunk("a", vec![0.5, 0.5]),
            chunk("b", vec![0.5, 0.5]),
            chunk("c", vec![0.9, 0.1]),
        ];

        let first = top_k(&[1.0, 0.0], &candidates, 3).unwrap();
        let second = top_k(&[1.0, 0.0], &candidates, 3).unwrap();
        assert_eq!(first, second);
    }
}
