//! Offline embedder for tests and local runs without a provider.

use crate::embed::{EmbeddingsProvider, RagFuture, ensure_text};

/// Deterministic bag-of-words embedder.
///
/// Lower-cased alphanumeric tokens are hashed (FNV-1a) into `dim` buckets
/// and the counts are L2-normalised, so texts sharing words have a positive
/// cosine similarity and unrelated texts score near zero.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        let lower = text.to_lowercase();
        for token in lower.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            v[(fnv1a(token) % self.dim as u64) as usize] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

impl EmbeddingsProvider for HashingEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> RagFuture<'a, Vec<f32>> {
        Box::pin(async move {
            ensure_text(text)?;
            Ok(self.vectorize(text))
        })
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf2_9ce4_8422_2325, |h, b| {
        (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
