//! Unified error types for the crate.

use thiserror::Error;

/// Top-level error for rag-store operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// I/O or filesystem errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unsupported configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Chunk parameters violate `overlap < size`, `size > 0`.
    #[error("invalid chunking parameters: size={size}, overlap={overlap}")]
    InvalidChunking { size: usize, overlap: usize },

    /// Embedding requested for blank text.
    #[error("cannot embed empty text")]
    EmptyText,

    /// Embedding provider failed (network, auth, decode).
    #[error("embedding provider error: {0}")]
    Embedding(String),

    /// Mismatch in vector dimensionality.
    #[error("vector size mismatch: got {got}, want {want}")]
    VectorSizeMismatch { got: usize, want: usize },

    /// Qdrant client errors (wrapped).
    #[error("qdrant error: {0}")]
    Qdrant(String),
}

impl RagError {
    /// `true` for errors that come from configuration rather than a remote service.
    pub fn is_config(&self) -> bool {
        matches!(self, RagError::Config(_) | RagError::InvalidChunking { .. })
    }
}

impl From<ai_llm_service::AiLlmError> for RagError {
    fn from(e: ai_llm_service::AiLlmError) -> Self {
        if e.is_config() {
            RagError::Config(e.to_string())
        } else {
            RagError::Embedding(e.to_string())
        }
    }
}
