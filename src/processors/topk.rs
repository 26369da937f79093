//! Top-k selection over per-label scores.

/// Returns the indexes and scores of the `k` highest-scoring entries.
///
/// Results are ordered by descending score; entries with equal scores keep
/// their original index order, so ties resolve in vocabulary order. `k` is
/// truncated to the number of entries.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
    // Stable sort keeps equal-score entries in index order.
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k.min(scores.len()));
    indexed
}

/// Returns the index of the highest-scoring entry, ties broken by index.
pub fn arg_max(scores: &[f32]) -> Option<usize> {
    top_k(scores, 1).first().map(|&(idx, _)| idx)
}
