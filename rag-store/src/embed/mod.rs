//! Embedding provider seam.
//!
//! Async is required because real providers (Jina, OpenAI, Ollama) perform
//! HTTP requests.

use std::{future::Future, pin::Pin};

use crate::errors::RagError;

pub mod hashing;
pub mod llm;

/// Boxed future returned by the async seams of this crate.
pub type RagFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RagError>> + Send + 'a>>;

/// Provider interface for embedding generation.
///
/// Implementations must reject blank input with [`RagError::EmptyText`]
/// without calling out, and return vectors of a single fixed dimension.
pub trait EmbeddingsProvider: Send + Sync {
    /// Async embedding function.
    fn embed<'a>(&'a self, text: &'a str) -> RagFuture<'a, Vec<f32>>;
}

/// Fails with [`RagError::EmptyText`] for blank input.
pub(crate) fn ensure_text(text: &str) -> Result<(), RagError> {
    if text.trim().is_empty() {
        Err(RagError::EmptyText)
    } else {
        Ok(())
    }
}

/// Fails with [`RagError::VectorSizeMismatch`] when `want` is set and differs.
pub(crate) fn ensure_dim(v: &[f32], want: Option<usize>) -> Result<(), RagError> {
    match want {
        Some(want) if v.len() != want => Err(RagError::VectorSizeMismatch {
            got: v.len(),
            want,
        }),
        _ => Ok(()),
    }
}
