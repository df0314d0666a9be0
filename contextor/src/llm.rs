//! Chat model seam used by the reformulator and the answer generator.

use std::{future::Future, pin::Pin};

use ai_llm_service::{AiLlmError, ChatMessage, ChatStream, LlmServiceProfiles};

/// Boxed future returned by [`ChatModel`].
pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AiLlmError>> + Send + 'a>>;

/// A language model that answers a list of chat messages.
pub trait ChatModel: Send + Sync {
    /// One non-streaming completion.
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String>;

    /// Token-streamed completion.
    fn stream<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, ChatStream>;
}

/// The chat profile of the shared LLM service.
impl ChatModel for LlmServiceProfiles {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(self.chat(messages))
    }

    fn stream<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, ChatStream> {
        Box::pin(self.chat_stream(messages))
    }
}
