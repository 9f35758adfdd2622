#[cfg(test)]
mod tests;

use tracing::debug;

use super::{Embedding, EmbeddingProvider, preprocess};
use crate::{DocqaError, Result};

const MODEL_NAME: &str = "feature-hash-v1";

/// Offline embedding backend based on token feature hashing.
///
/// Each whitespace-separated token is hashed into one of `dimension`
/// buckets and the bucket weights are L2-normalized. The result is a crude
/// but fully deterministic bag-of-words vector: texts sharing vocabulary
/// score high, unrelated texts score near zero. Useful for tests and for
/// deployments that cannot reach an embedding service.
#[derive(Debug, Clone)]
pub struct LocalEmbeddingProvider {
    dimension: usize,
}

impl LocalEmbeddingProvider {
    #[inline]
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(DocqaError::Config(
                "embedding dimension must be non-zero".to_string(),
            ));
        }
        debug!("local feature-hash embedder with {} dimensions", dimension);
        Ok(Self { dimension })
    }

    fn embed_processed(&self, processed: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in processed.split_whitespace() {
            let bucket = (fnv1a_64(token) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }

        vector
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    #[inline]
    fn model_name(&self) -> &str {
        MODEL_NAME
    }

    #[inline]
    fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let processed = preprocess(text);
        if processed.is_empty() {
            return Err(DocqaError::EmptyInput);
        }
        Ok(self.embed_processed(&processed))
    }

    #[inline]
    fn embed_many(&self, texts: &[String]) -> Vec<Embedding> {
        texts
            .iter()
            .map(|text| match self.embed_one(text) {
                Ok(vector) => Embedding::new(vector, MODEL_NAME),
                Err(_) => Embedding::degraded(self.dimension, MODEL_NAME),
            })
            .collect()
    }
}

fn fnv1a_64(token: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
