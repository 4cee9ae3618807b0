//! Embedding provider abstraction
//!
//! The engine consumes embeddings through this trait; the provider itself
//! (local model, remote API) is an external collaborator. Any provider
//! failure is treated as transient: queries degrade to lexical-only
//! ranking, indexing retries and then defers the chunk.
//!
//! `HashedProjectionEmbedder` is the built-in no-model-file provider:
//! deterministic, offline, and the default for tests.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::Result;

/// Contract with the embedding provider. Output dimension is fixed and
/// identical across calls for a given provider instance.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. Output order matches input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Provider name/identifier.
    fn name(&self) -> &str;
}

/// Default dimension of the hashed projection embedder.
pub const HASHED_PROJECTION_DIM: usize = 256;

/// Token-hash bucket projection, L2-normalized.
///
/// Not a learned model: two texts sharing tokens land near each other,
/// which is enough signal for offline use and deterministic tests. Real
/// deployments inject a model-backed `EmbeddingProvider` instead.
pub struct HashedProjectionEmbedder {
    dimension: usize,
}

impl HashedProjectionEmbedder {
    pub fn new() -> Self {
        Self {
            dimension: HASHED_PROJECTION_DIM,
        }
    }

    /// A zero dimension is clamped to 1: `bucket` reduces modulo the
    /// dimension, which must never be zero.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimension
    }
}

impl Default for HashedProjectionEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HashedProjectionEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in super::lexical::tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashed-projection-256"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_has_declared_dimension_and_unit_norm() {
        let embedder = HashedProjectionEmbedder::new();
        let emb = embedder.embed("fn parse_config() {}").unwrap();
        assert_eq!(emb.len(), embedder.dimension());

        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashedProjectionEmbedder::new();
        let a = embedder.embed("hash map insert").unwrap();
        let b = embedder.embed("hash map insert").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn shared_tokens_raise_similarity() {
        let embedder = HashedProjectionEmbedder::new();
        let base = embedder.embed("parse config file").unwrap();
        let close = embedder.embed("parse config data").unwrap();
        let distant = embedder.embed("render html report").unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| x * y).sum()
        };
        assert!(dot(&base, &close) > dot(&base, &distant));
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let embedder = HashedProjectionEmbedder::new();
        let emb = embedder.embed("").unwrap();
        assert!(emb.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn zero_dimension_is_clamped_to_one() {
        let embedder = HashedProjectionEmbedder::with_dimension(0);
        assert_eq!(embedder.dimension(), 1);

        let emb = embedder.embed("token").unwrap();
        assert_eq!(emb.len(), 1);
    }

    #[test]
    fn batch_order_matches_input_order() {
        let embedder = HashedProjectionEmbedder::new();
        let batch = embedder.embed_batch(&["alpha", "beta"]).unwrap();
        assert_eq!(batch[0], embedder.embed("alpha").unwrap());
        assert_eq!(batch[1], embedder.embed("beta").unwrap());
    }
}
