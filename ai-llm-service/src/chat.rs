//! Chat message types and the token stream returned by streaming completions.
//!
//! A [`ChatStream`] is a one-directional stream of text increments that ends
//! with exactly one terminal marker: [`StreamEvent::Done`] or
//! [`StreamEvent::Failed`]. Dropping the stream closes the channel, which the
//! producing task observes and stops reading from the provider.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error_handler::{AiLlmError, ProviderError, ProviderErrorKind};
use crate::config::llm_provider::LlmProvider;

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One message of a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Item of a [`ChatStream`].
#[derive(Debug)]
pub enum StreamEvent {
    /// A non-empty text increment, in arrival order.
    Delta(String),
    /// The provider finished the answer.
    Done,
    /// The stream broke; text received so far stays valid.
    Failed(AiLlmError),
}

/// Receiving half of a streamed completion.
#[derive(Debug)]
pub struct ChatStream {
    rx: mpsc::Receiver<StreamEvent>,
    provider: LlmProvider,
    finished: bool,
}

/// Sending half handed to the task that reads the provider response.
pub type StreamSender = mpsc::Sender<StreamEvent>;

impl ChatStream {
    /// Creates a bounded channel pair.
    pub fn channel(provider: LlmProvider, capacity: usize) -> (StreamSender, ChatStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            ChatStream {
                rx,
                provider,
                finished: false,
            },
        )
    }

    /// Next event, or `None` once a terminal marker has been delivered.
    ///
    /// A producer that goes away without sending `Done`/`Failed` yields a
    /// single `Failed` event.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        match self.rx.recv().await {
            Some(StreamEvent::Delta(text)) => Some(StreamEvent::Delta(text)),
            Some(terminal) => {
                self.finished = true;
                Some(terminal)
            }
            None => {
                self.finished = true;
                Some(StreamEvent::Failed(
                    ProviderError::new(
                        self.provider,
                        ProviderErrorKind::Stream("stream closed before completion".into()),
                    )
                    .into(),
                ))
            }
        }
    }

    /// Drains the stream into a single string.
    ///
    /// # Errors
    /// On `Failed`, returns the partial text together with the error.
    pub async fn collect_text(mut self) -> Result<String, (String, AiLlmError)> {
        let mut out = String::new();
        while let Some(ev) = self.next_event().await {
            match ev {
                StreamEvent::Delta(t) => out.push_str(&t),
                StreamEvent::Done => return Ok(out),
                StreamEvent::Failed(e) => return Err((out, e)),
            }
        }
        Ok(out)
    }
}
