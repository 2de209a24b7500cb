//! Vector similarity utilities.
//!
//! Pure-Rust cosine similarity and top-k ranking over indexed documents.

use flowdeck_core::document::Document;
use serde::{Deserialize, Serialize};

/// A document together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    pub doc: Document,
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or empty.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank entries by cosine similarity to a query embedding.
///
/// Returns at most `k` `(score, document)` pairs, highest score first.
/// Entries without an embedding are skipped.
pub fn rank_by_similarity<'a>(
    entries: impl IntoIterator<Item = &'a VectorEntry>,
    query_embedding: &[f32],
    k: usize,
) -> Vec<(f32, Document)> {
    let mut scored: Vec<(f32, &VectorEntry)> = entries
        .into_iter()
        .filter(|e| !e.embedding.is_empty())
        .map(|e| (cosine_similarity(&e.embedding, query_embedding), e))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored.into_iter().map(|(s, e)| (s, e.doc.clone())).collect()
}
