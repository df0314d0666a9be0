//! Typed error for the contextor crate.

use ai_llm_service::AiLlmError;
use rag_store::RagError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextorError>;

#[derive(Debug, Error)]
pub enum ContextorError {
    /// Errors from the chat model service.
    #[error("LLM error: {0}")]
    Llm(#[from] AiLlmError),

    /// Errors from the underlying rag-store crate.
    #[error("RAG error: {0}")]
    Rag(#[from] RagError),

    /// The answer stream ended with an error; `partial` is what arrived before it.
    #[error("answer stream interrupted after {} chars: {source}", partial.chars().count())]
    StreamInterrupted {
        partial: String,
        #[source]
        source: AiLlmError,
    },

    #[error("question is empty")]
    EmptyQuestion,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Console I/O in the interactive loop.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by callers to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Missing/invalid settings; fatal at startup.
    Configuration,
    /// A remote dependency (model, embeddings, vector store) failed.
    ExternalService,
    /// Streaming broke mid-answer; partial text is kept, no retry.
    StreamInterrupted,
    /// The caller sent something unusable.
    InvalidInput,
}

impl ContextorError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ContextorError::Config(_) => FailureKind::Configuration,
            ContextorError::Llm(e) if e.is_config() => FailureKind::Configuration,
            ContextorError::Rag(e) if e.is_config() => FailureKind::Configuration,
            ContextorError::Rag(RagError::EmptyText) | ContextorError::EmptyQuestion => {
                FailureKind::InvalidInput
            }
            ContextorError::StreamInterrupted { .. } => FailureKind::StreamInterrupted,
            ContextorError::Llm(_) | ContextorError::Rag(_) | ContextorError::Io(_) => {
                FailureKind::ExternalService
            }
        }
    }

    /// Partial answer text carried by a stream interruption.
    pub fn partial_answer(&self) -> Option<&str> {
        match self {
            ContextorError::StreamInterrupted { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
