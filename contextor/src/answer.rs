//! Grounded answer generation, batch or streamed.

use std::sync::Arc;

use ai_llm_service::ChatStream;
use rag_store::RagHit;
use tracing::{debug, instrument};

use crate::error::ContextorError;
use crate::history::ChatHistory;
use crate::llm::ChatModel;
use crate::prompt::{one_shot_messages, qa_messages};

#[derive(Clone)]
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// One non-streaming model call over the QA prompt.
    ///
    /// # Errors
    /// Model call failures.
    #[instrument(skip_all, fields(context = hits.len(), history = history.len()))]
    pub async fn answer(
        &self,
        question: &str,
        hits: &[RagHit],
        history: &ChatHistory,
    ) -> Result<String, ContextorError> {
        let messages = qa_messages(hits, history, question);
        let answer = self.model.complete(&messages).await?;
        debug!(chars = answer.len(), "answer generated");
        Ok(answer.trim().to_string())
    }

    /// Token stream over the QA prompt.
    ///
    /// # Errors
    /// Failures before the first token; later failures arrive in the stream.
    #[instrument(skip_all, fields(context = hits.len(), history = history.len()))]
    pub async fn answer_stream(
        &self,
        question: &str,
        hits: &[RagHit],
        history: &ChatHistory,
    ) -> Result<ChatStream, ContextorError> {
        let messages = qa_messages(hits, history, question);
        Ok(self.model.stream(&messages).await?)
    }

    /// Single-turn answer that falls back to "I'm not sure".
    pub async fn answer_once(&self, question: &str, hits: &[RagHit]) -> Result<String, ContextorError> {
        let messages = one_shot_messages(hits, question);
        Ok(self.model.complete(&messages).await?.trim().to_string())
    }
}
