//! History-aware RAG over `rag-store` and the shared LLM service.
//!
//! A turn flows through three stages: the [`QueryReformulator`] turns a
//! follow-up into a standalone question, the [`Retriever`] fetches at most
//! `k` chunks above a similarity threshold, and the [`AnswerGenerator`]
//! answers from that context only (batch or token-streamed). [`RagChain`]
//! wires the stages; [`ConversationLoop`] drives them turn by turn over a
//! line-based console.
//!
//! # Example
//! ```no_run
//! # use std::sync::Arc;
//! # use contextor::{ChatHistory, ContextorConfig, RagChain};
//! # async fn run(model: Arc<ai_llm_service::LlmServiceProfiles>, store: rag_store::RagStore)
//! # -> Result<(), contextor::ContextorError> {
//! let chain = RagChain::new(model, store, ContextorConfig::from_process_env()?);
//! let qa = chain.ask(&ChatHistory::new(), "What are the different types of soil?").await?;
//! println!("{}", qa.answer);
//! # Ok(()) }
//! ```

mod answer;
mod api_types;
mod cfg;
mod chain;
mod conversation;
mod error;
mod history;
mod llm;
mod progress;
pub mod prompt;
mod reformulate;
mod retrieve;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use answer::AnswerGenerator;
pub use api_types::{QaAnswer, UsedChunk};
pub use cfg::ContextorConfig;
pub use chain::{RagChain, StreamingAnswer};
pub use conversation::{ConversationLoop, LoopState, TurnOutcome, is_exit};
pub use error::{ContextorError, FailureKind, Result};
pub use history::{ChatHistory, Role, Turn};
pub use llm::{ChatFuture, ChatModel};
pub use progress::{IndicatifProgress, NoopProgress, Progress, Stage};
pub use reformulate::QueryReformulator;
pub use retrieve::{Retriever, used_chunks};
