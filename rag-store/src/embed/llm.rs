//! Embedding provider backed by the shared LLM service (Jina, OpenAI or Ollama).

use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use tracing::warn;

use crate::embed::{EmbeddingsProvider, RagFuture, ensure_dim, ensure_text};

/// Embeds text through the **embedding** profile of [`LlmServiceProfiles`].
#[derive(Clone)]
pub struct LlmEmbedder {
    svc: Arc<LlmServiceProfiles>,
    /// Enforced vector dimension, if configured.
    dim: Option<usize>,
}

impl LlmEmbedder {
    pub fn new(svc: Arc<LlmServiceProfiles>, dim: Option<usize>) -> Self {
        Self { svc, dim }
    }
}

impl EmbeddingsProvider for LlmEmbedder {
    fn embed<'a>(&'a self, text: &'a str) -> RagFuture<'a, Vec<f32>> {
        Box::pin(async move {
            ensure_text(text)?;
            let v = self.svc.embed(text).await.inspect_err(|e| {
                warn!(error = %e, "embedding request failed");
            })?;
            ensure_dim(&v, self.dim)?;
            Ok(v)
        })
    }
}
