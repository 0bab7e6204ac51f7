/// Produces a deterministic or model-backed vector for a string.
///
/// Implementations return the vector alongside the model identifier that
/// actually produced it, so a later change of provider never silently
/// poisons stored comparisons (design note: expose this as an owned object
/// passed into the repository, not a module-level singleton, so tests can
/// swap it).
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`. `model_hint` is advisory; an implementation that does
    /// not support the requested model falls back to its default and
    /// reports the model it actually used.
    fn embed(&self, text: &str, model_hint: Option<&str>) -> (Vec<f32>, String);
}

/// Cosine similarity of two equal-length unit vectors is their dot product.
/// Mismatched lengths or either vector being empty yields 0.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() || right.is_empty() {
        return 0.0;
    }
    left.iter().zip(right.iter()).map(|(a, b)| a * b).sum()
}

/// L2-normalize a vector in place. The all-zero vector stays all-zero.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_empty_is_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn cosine_similarity_identical_unit_vectors_is_one() {
        let v = vec![1.0_f32, 0.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_zero_vector_stays_zero() {
        let mut v = vec![0.0_f32; 4];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn l2_normalize_produces_unit_length() {
        let mut v = vec![3.0_f32, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
