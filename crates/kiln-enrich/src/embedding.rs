use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use kiln_core::{l2_normalize, EmbeddingProvider};

const DIMENSIONS: usize = 64;
const MODEL_ID: &str = "token-hash-v1";

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]+").unwrap())
}

fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    token_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() >= 2)
        .collect()
}

/// Deterministic fallback embedding provider. Tokenizes on `[a-z0-9]+`
/// (length >= 2), hashes each token with SHA-256, buckets it into a
/// 64-dimensional vector by the first two bytes modulo 64, and
/// L2-normalizes the result.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashEmbeddingProvider;

impl HashEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }

    fn hash_embed(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; DIMENSIONS];
        for token in tokenize(text) {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = (u16::from_be_bytes([digest[0], digest[1]]) as usize) % DIMENSIONS;
            vector[bucket] += 1.0;
        }
        l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str, _model_hint: Option<&str>) -> (Vec<f32>, String) {
        (Self::hash_embed(text), MODEL_ID.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_has_expected_dimension() {
        let (vector, model) = HashEmbeddingProvider::new().embed("hello world", None);
        assert_eq!(vector.len(), DIMENSIONS);
        assert_eq!(model, MODEL_ID);
    }

    #[test]
    fn empty_text_yields_all_zero_vector() {
        let (vector, _) = HashEmbeddingProvider::new().embed("", None);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn is_deterministic() {
        let provider = HashEmbeddingProvider::new();
        let (a, _) = provider.embed("kubernetes cluster rollout", None);
        let (b, _) = provider.embed("kubernetes cluster rollout", None);
        assert_eq!(a, b);
    }

    #[test]
    fn vector_is_unit_normalized() {
        let (vector, _) = HashEmbeddingProvider::new().embed("some distinctive words here", None);
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }
}
