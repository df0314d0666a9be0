//! Shared LLM service with two active profiles: `chat` and `embedding`.
//!
//! - Lives in the same Tokio runtime as the application.
//! - Construct once, wrap in `Arc`, and pass clones to dependents.
//! - Caches underlying HTTP clients per config (provider+endpoint+model+key+version+timeout).
//! - Dispatches to the Ollama client or the OpenAI-compatible client by provider.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use ai_llm_service::{ChatMessage, LlmServiceProfiles};
//! use ai_llm_service::config::default_config::{config_chat_from_env, config_embedding_from_env};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), ai_llm_service::AiLlmError> {
//! let svc = Arc::new(LlmServiceProfiles::new(
//!     config_chat_from_env()?,
//!     config_embedding_from_env()?,
//!     Some(10),
//! )?);
//!
//! let answer = svc.chat(&[ChatMessage::user("Hello")]).await?;
//! let emb = svc.embed("Ferris").await?;
//! println!("{answer} / dim = {}", emb.len());
//! # Ok(()) }
//! ```

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    chat::{ChatMessage, ChatStream},
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, ConfigError},
    health_service::{HealthService, HealthStatus},
    services::{ollama_service::OllamaService, open_ai_service::OpenAiService},
};

/// Either concrete client, shared through the cache.
#[derive(Debug, Clone)]
enum Client {
    Ollama(Arc<OllamaService>),
    OpenAi(Arc<OpenAiService>),
}

/// Shared service that manages the **chat** and **embedding** profiles.
pub struct LlmServiceProfiles {
    chat: LlmModelConfig,
    embedding: LlmModelConfig,

    clients: RwLock<HashMap<ClientKey, Client>>,

    health: HealthService,
}

impl LlmServiceProfiles {
    /// Creates a new service with both profiles.
    ///
    /// # Errors
    /// - [`ConfigError::UnsupportedRole`] if the chat profile is a Jina
    ///   (embeddings-only) config
    /// - [`AiLlmError::HttpTransport`] if the health client cannot be built
    pub fn new(
        chat: LlmModelConfig,
        embedding: LlmModelConfig,
        health_timeout_secs: Option<u64>,
    ) -> Result<Self, AiLlmError> {
        if chat.provider == LlmProvider::Jina {
            return Err(ConfigError::UnsupportedRole {
                provider: chat.provider,
                role: "chat",
            }
            .into());
        }

        Ok(Self {
            chat,
            embedding,
            clients: RwLock::new(HashMap::new()),
            health: HealthService::new(health_timeout_secs)?,
        })
    }

    /// Single chat completion with the **chat** profile.
    ///
    /// # Errors
    /// Returns [`AiLlmError`] if the provider call fails.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        match self.client(&self.chat).await? {
            Client::Ollama(c) => c.chat(messages).await,
            Client::OpenAi(c) => c.chat(messages).await,
        }
    }

    /// Streamed chat completion with the **chat** profile.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, AiLlmError> {
        match self.client(&self.chat).await? {
            Client::Ollama(c) => c.chat_stream(messages).await,
            Client::OpenAi(c) => c.chat_stream(messages).await,
        }
    }

    /// Computes embeddings using the **embedding** profile.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match self.client(&self.embedding).await? {
            Client::Ollama(c) => c.embeddings(input).await,
            Client::OpenAi(c) => c.embeddings(input).await,
        }
    }

    /// Returns a health snapshot for all distinct profiles.
    pub async fn health_all(&self) -> Vec<HealthStatus> {
        let mut list = vec![self.chat.clone()];
        if self.embedding != self.chat {
            list.push(self.embedding.clone());
        }
        self.health.check_many(&list).await
    }

    /// Returns references to the current profiles `(chat, embedding)`.
    pub fn profiles(&self) -> (&LlmModelConfig, &LlmModelConfig) {
        (&self.chat, &self.embedding)
    }

    /* --------------------- Internals --------------------- */

    async fn client(&self, cfg: &LlmModelConfig) -> Result<Client, AiLlmError> {
        let key = ClientKey::from(cfg);
        if let Some(cli) = self.clients.read().await.get(&key).cloned() {
            return Ok(cli);
        }

        let mut w = self.clients.write().await;
        if let Some(cli) = w.get(&key).cloned() {
            return Ok(cli);
        }
        let cli = match cfg.provider {
            LlmProvider::Ollama => Client::Ollama(Arc::new(OllamaService::new(cfg.clone())?)),
            _ => Client::OpenAi(Arc::new(OpenAiService::new(cfg.clone())?)),
        };
        debug!(provider = ?cfg.provider, model = %cfg.model, "client cached");
        w.insert(key, cli.clone());
        Ok(cli)
    }
}

/// Internal cache key to identify unique client configs.
#[derive(Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    api_version: Option<String>,
    timeout: Option<u64>,
}

impl From<&LlmModelConfig> for ClientKey {
    fn from(cfg: &LlmModelConfig) -> Self {
        Self {
            provider: cfg.provider,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone(),
            api_version: cfg.api_version.clone(),
            timeout: cfg.timeout_secs,
        }
    }
}
