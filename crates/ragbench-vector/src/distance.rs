//! Cosine similarity.
//!
//! The index ranks by cosine similarity only. The exact scan and the HNSW
//! re-scoring step both go through [`cosine_similarity`], so the two
//! algorithms agree on every score they report.

/// Euclidean norm of a vector.
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 means identical direction. A zero
/// vector has no direction and scores 0 against everything.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "Vector dimensions must match");
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        return 0.0;
    }
    similarity_with_norms(a, b, denom)
}

/// Cosine similarity when the product of the norms is already known.
#[inline]
pub(crate) fn similarity_with_norms(a: &[f32], b: &[f32], denom: f32) -> f32 {
    if denom == 0.0 {
        return 0.0;
    }

    let mut dot = 0.0f32;

    // Manual loop unrolling for better performance
    let chunks = a.len() / 4;
    for i in 0..chunks {
        let base = i * 4;
        dot += a[base] * b[base]
            + a[base + 1] * b[base + 1]
            + a[base + 2] * b[base + 2]
            + a[base + 3] * b[base + 3];
    }
    for idx in chunks * 4..a.len() {
        dot += a[idx] * b[idx];
    }

    (dot / denom).clamp(-1.0, 1.0)
}
