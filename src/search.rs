//! Cosine-similarity ranking over stored chunk vectors.
//!
//! Retrieval is a full scan: every vector stored under the model is scored
//! against the query and the top K survive. No index structure — the
//! corpus is a single-process document set, not a vector database.
//!
//! The threshold is a hard filter when applied. When nothing clears it,
//! the ranker returns nothing: the best-effort fallback (re-querying with
//! the threshold off) is the caller's explicit, logged decision, never an
//! internal substitution.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{ScoredChunk, StoredVector};
use crate::store;

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` for empty, zero-norm, or length-mismatched input —
/// never an error, never a division by zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Score and rank a set of stored vectors against a query vector.
///
/// Pure: scores every row, optionally filters by `min_similarity`, then
/// stable-sorts descending so rows with equal similarity keep their scan
/// (insertion) order, and truncates to `top_k`.
pub fn rank_chunks(
    rows: &[StoredVector],
    query: &[f32],
    top_k: usize,
    min_similarity: f32,
    apply_threshold: bool,
) -> Vec<ScoredChunk> {
    let mut results: Vec<ScoredChunk> = rows
        .iter()
        .filter_map(|row| {
            let similarity = cosine_similarity(query, &row.embedding);
            if apply_threshold && similarity < min_similarity {
                return None;
            }
            Some(ScoredChunk {
                doc_name: row.doc_name.clone(),
                chunk_index: row.chunk_index,
                text: row.text.clone(),
                similarity,
            })
        })
        .collect();

    // sort_by is stable: ties keep insertion order.
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

/// Rank every chunk stored under `model` against a query vector.
pub async fn search_chunks(
    pool: &SqlitePool,
    query: &[f32],
    model: &str,
    top_k: usize,
    min_similarity: f32,
    apply_threshold: bool,
) -> Result<Vec<ScoredChunk>> {
    let rows = store::all_vectors(pool, model).await?;
    Ok(rank_chunks(
        &rows,
        query,
        top_k,
        min_similarity,
        apply_threshold,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(doc: &str, index: i64, embedding: Vec<f32>) -> StoredVector {
        StoredVector {
            doc_name: doc.to_string(),
            chunk_index: index,
            text: format!("{doc}#{index}"),
            embedding,
        }
    }

    #[test]
    fn test_cosine_self_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector_is_zero() {
        let v = vec![1.0, 2.0];
        let zero = vec![0.0, 0.0];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn test_cosine_symmetric() {
        let a = vec![0.3, -0.8, 0.5];
        let b = vec![1.2, 0.4, -0.7];
        assert!((cosine_similarity(&a, &b) - cosine_similarity(&b, &a)).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_length_mismatch_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_rank_orders_descending_and_truncates() {
        let rows = vec![
            row("a", 0, vec![1.0, 0.0]),
            row("a", 1, vec![0.0, 1.0]),
            row("a", 2, vec![0.7, 0.7]),
        ];
        let results = rank_chunks(&rows, &[1.0, 0.0], 2, 0.0, false);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 0);
        assert_eq!(results[1].chunk_index, 2);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[test]
    fn test_threshold_filters_before_truncation() {
        let rows = vec![
            row("a", 0, vec![1.0, 0.0]),
            row("a", 1, vec![0.0, 1.0]),
            row("a", 2, vec![0.95, 0.1]),
        ];
        let results = rank_chunks(&rows, &[1.0, 0.0], 10, 0.9, true);
        for r in &results {
            assert!(r.similarity >= 0.9);
        }
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_threshold_off_keeps_low_scores() {
        let rows = vec![row("a", 0, vec![0.0, 1.0])];
        let results = rank_chunks(&rows, &[1.0, 0.0], 1, 0.9, false);
        assert_eq!(results.len(), 1);
        assert!(results[0].similarity < 0.9);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let rows = vec![
            row("a", 0, vec![1.0, 0.0]),
            row("b", 0, vec![1.0, 0.0]),
            row("c", 0, vec![1.0, 0.0]),
        ];
        let results = rank_chunks(&rows, &[1.0, 0.0], 3, 0.0, false);
        let docs: Vec<&str> = results.iter().map(|r| r.doc_name.as_str()).collect();
        assert_eq!(docs, vec!["a", "b", "c"]);
    }
}
