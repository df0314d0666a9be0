//! History-aware question reformulation.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::ContextorError;
use crate::history::ChatHistory;
use crate::llm::ChatModel;
use crate::prompt::contextualize_messages;

/// Rewrites follow-up questions into standalone ones.
#[derive(Clone)]
pub struct QueryReformulator {
    model: Arc<dyn ChatModel>,
    /// Call the model even when there is no history.
    always_call: bool,
}

impl QueryReformulator {
    pub fn new(model: Arc<dyn ChatModel>, always_call: bool) -> Self {
        Self { model, always_call }
    }

    /// Standalone form of `question` given `history`.
    ///
    /// Without history the question is returned unchanged and no model call
    /// is made (unless `always_call`). A blank model reply falls back to the
    /// raw question.
    ///
    /// # Errors
    /// Model call failures.
    #[instrument(skip_all, fields(history = history.len()))]
    pub async fn reformulate(
        &self,
        history: &ChatHistory,
        question: &str,
    ) -> Result<String, ContextorError> {
        let question = question.trim();
        if history.is_empty() && !self.always_call {
            return Ok(question.to_string());
        }

        let messages = contextualize_messages(history, question);
        let reply = self.model.complete(&messages).await?;
        let standalone = reply.trim();
        if standalone.is_empty() {
            debug!("blank reformulation, keeping the raw question");
            return Ok(question.to_string());
        }
        debug!(standalone, "question reformulated");
        Ok(standalone.to_string())
    }
}
