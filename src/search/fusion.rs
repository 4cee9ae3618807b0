//! Score fusion - normalized weighted sum of two ranked lists
//!
//! BM25 scores and cosine similarities live on different scales, so each
//! list is min-max normalized into [0, 1] before the weighted sum. The
//! fused ranking is a pure function of the two input lists: deterministic,
//! reproducible, no hidden state.

use std::collections::HashMap;

use crate::core::config::FusionWeights;

/// Min-max normalize scores into [0, 1]. A list with a single element or a
/// zero score range normalizes to all 1.0.
fn normalize(results: &[(String, f32)]) -> HashMap<&str, f32> {
    let mut normalized = HashMap::with_capacity(results.len());
    if results.is_empty() {
        return normalized;
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for (_, score) in results {
        min = min.min(*score);
        max = max.max(*score);
    }
    let range = max - min;

    for (id, score) in results {
        let norm = if range > 0.0 { (score - min) / range } else { 1.0 };
        normalized.insert(id.as_str(), norm);
    }
    normalized
}

/// Fuse lexical and vector result lists into one ranking.
///
/// For every chunk appearing in either list:
/// `fused = w_lex * norm_lex + w_vec * norm_vec`, where a chunk missing
/// from one list contributes 0 for that term. Sorted descending by fused
/// score, ties broken by chunk id ascending.
pub fn fuse(
    lexical: &[(String, f32)],
    vector: &[(String, f32)],
    weights: FusionWeights,
) -> Vec<(String, f32)> {
    let norm_lex = normalize(lexical);
    let norm_vec = normalize(vector);

    let mut fused: HashMap<&str, f32> = HashMap::new();
    for (id, norm) in &norm_lex {
        *fused.entry(*id).or_insert(0.0) += weights.lexical * *norm;
    }
    for (id, norm) in &norm_vec {
        *fused.entry(*id).or_insert(0.0) += weights.vector * *norm;
    }

    let mut ranked: Vec<(String, f32)> = fused
        .into_iter()
        .map(|(id, score)| (id.to_string(), score))
        .collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}
