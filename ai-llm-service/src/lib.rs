//! Shared LLM service for the RAG chat backend.
//!
//! Two logical profiles are exposed through [`service_profiles::LlmServiceProfiles`]:
//! - **chat**: chat completions, batch or token-streamed ([`chat::ChatStream`])
//! - **embedding**: fixed-dimension text embeddings
//!
//! Providers speak either the OpenAI wire format (OpenAI, Azure OpenAI, Jina)
//! or the Ollama API. Configuration is read strictly from the environment in
//! [`config::default_config`] and fails fast with [`error_handler::ConfigError`].

pub mod chat;
pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod service_profiles;
pub mod services;
pub mod telemetry;

pub use chat::{ChatMessage, ChatRole, ChatStream, StreamEvent, StreamSender};
pub use config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider};
pub use error_handler::{AiLlmError, ConfigError, Result};
pub use service_profiles::LlmServiceProfiles;
