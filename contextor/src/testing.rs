//! Deterministic chat model for tests of this crate and its dependants.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use ai_llm_service::error_handler::{ProviderError, ProviderErrorKind};
use ai_llm_service::{AiLlmError, ChatMessage, ChatStream, LlmProvider, StreamEvent};

use crate::llm::{ChatFuture, ChatModel};

/// One scripted model reaction, consumed in order by either call kind.
#[derive(Debug, Clone)]
pub enum Script {
    /// Whole reply. Streamed calls emit it as a single delta.
    Reply(String),
    /// Streamed deltas, each preceded by `pause`, then `Done`.
    Tokens { deltas: Vec<String>, pause: Duration },
    /// Streamed deltas followed by a stream failure.
    BreakAfter(Vec<String>),
    /// The call itself fails.
    Fail(String),
}

impl Script {
    pub fn reply(text: impl Into<String>) -> Self {
        Script::Reply(text.into())
    }

    pub fn tokens<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Script::Tokens {
            deltas: deltas.into_iter().map(Into::into).collect(),
            pause: Duration::ZERO,
        }
    }

    /// Like [`Script::tokens`] but sleeps `pause` before each delta.
    pub fn slow_tokens<I, S>(deltas: I, pause: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Script::Tokens {
            deltas: deltas.into_iter().map(Into::into).collect(),
            pause,
        }
    }
}

/// [`ChatModel`] that plays back [`Script`]s and records every request.
///
/// Running out of scripts is reported as a provider error.
#[derive(Debug, Default)]
pub struct ScriptedChatModel {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    pub fn new(scripts: impl IntoIterator<Item = Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next(&self, messages: &[ChatMessage]) -> Result<Script, AiLlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.scripts
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .ok_or_else(|| failure("script exhausted"))
    }
}

impl ChatModel for ScriptedChatModel {
    fn complete<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, String> {
        Box::pin(async move {
            match self.next(messages)? {
                Script::Reply(text) => Ok(text),
                Script::Tokens { deltas, .. } => Ok(deltas.concat()),
                Script::BreakAfter(_) => Err(failure("connection reset")),
                Script::Fail(msg) => Err(failure(&msg)),
            }
        })
    }

    fn stream<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatFuture<'a, ChatStream> {
        Box::pin(async move {
            let (deltas, pause, broken) = match self.next(messages)? {
                Script::Reply(text) => (vec![text], Duration::ZERO, false),
                Script::Tokens { deltas, pause } => (deltas, pause, false),
                Script::BreakAfter(deltas) => (deltas, Duration::ZERO, true),
                Script::Fail(msg) => return Err(failure(&msg)),
            };

            let (tx, stream) = ChatStream::channel(LlmProvider::OpenAI, 8);
            tokio::spawn(async move {
                for d in deltas {
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    if tx.send(StreamEvent::Delta(d)).await.is_err() {
                        return;
                    }
                }
                let end = if broken {
                    StreamEvent::Failed(failure("connection reset"))
                } else {
                    StreamEvent::Done
                };
                let _ = tx.send(end).await;
            });
            Ok(stream)
        })
    }
}

fn failure(msg: &str) -> AiLlmError {
    ProviderError::new(LlmProvider::OpenAI, ProviderErrorKind::Stream(msg.to_string())).into()
}
