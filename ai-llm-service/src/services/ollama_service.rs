//! Lightweight Ollama service for chat and embeddings.
//!
//! This module implements a thin client for the local Ollama API:
//! - `POST {endpoint}/api/chat`       — chat completion (batch or NDJSON stream)
//! - `POST {endpoint}/api/embeddings` — embeddings retrieval
//!
//! It uses the universal configuration [`LlmModelConfig`] and ensures
//! that the selected provider is [`LlmProvider::Ollama`].
//!
//! # Examples
//!
//! ```no_run
//! use ai_llm_service::{ChatMessage, LlmModelConfig, LlmProvider};
//! use ai_llm_service::services::ollama_service::OllamaService;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = LlmModelConfig {
//!     provider: LlmProvider::Ollama,
//!     model: "llama3".into(),
//!     endpoint: "http://localhost:11434".into(),
//!     api_key: None,
//!     api_version: None,
//!     max_tokens: Some(256),
//!     temperature: Some(0.0),
//!     top_p: None,
//!     timeout_secs: Some(30),
//! };
//!
//! let svc = OllamaService::new(cfg)?;
//! let text = svc.chat(&[ChatMessage::user("Name three soil types.")]).await?;
//! println!("{text}");
//! # Ok(()) }
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::{
    chat::{ChatMessage, ChatStream},
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, HttpError, ProviderError, ProviderErrorKind, make_snippet},
    services::stream_decode::{decode_ollama_ndjson_line, pump},
};

const STREAM_CAPACITY: usize = 64;

/// Thin client for Ollama.
///
/// Initialized with a full [`LlmModelConfig`]. Reuses an HTTP client with
/// a configurable timeout.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OllamaService {
    /// Creates a new [`OllamaService`] from the given config.
    ///
    /// # Errors
    /// - `InvalidProvider` if `cfg.provider` is not `Ollama`
    /// - `InvalidEndpoint` if `cfg.endpoint` is invalid
    /// - [`AiLlmError::HttpTransport`] if HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        if cfg.provider != LlmProvider::Ollama {
            return Err(
                ProviderError::new(cfg.provider, ProviderErrorKind::InvalidProvider).into(),
            );
        }

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(60));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .brotli(true)
            .build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{base}/api/chat");
        let url_embeddings = format!("{base}/api/embeddings");

        info!(model = %cfg.model, endpoint = %cfg.endpoint, "OllamaService initialized");

        Ok(Self {
            client,
            cfg,
            url_chat,
            url_embeddings,
        })
    }

    pub fn config(&self) -> &LlmModelConfig {
        &self.cfg
    }

    /// Performs a **non-streaming** chat request via `/api/chat`.
    ///
    /// Mapped options:
    /// - `num_predict`  ← `self.cfg.max_tokens`
    /// - `temperature`  ← `self.cfg.temperature`
    /// - `top_p`        ← `self.cfg.top_p`
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatRequest::from_cfg(&self.cfg, messages, false);

        debug!(messages = messages.len(), "POST {}", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat).await?;

        let out: ChatResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `message.content`")),
            )
        })?;

        info!(
            latency_ms = started.elapsed().as_millis(),
            answer_len = out.message.content.len(),
            "chat completed"
        );
        Ok(out.message.content)
    }

    /// Starts a streaming chat request (`stream: true`, NDJSON framing).
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, AiLlmError> {
        let body = ChatRequest::from_cfg(&self.cfg, messages, true);

        debug!(messages = messages.len(), "POST {} (stream)", self.url_chat);
        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat).await?;

        let (tx, stream) = ChatStream::channel(LlmProvider::Ollama, STREAM_CAPACITY);
        tokio::spawn(pump(resp, LlmProvider::Ollama, decode_ollama_ndjson_line, tx));
        Ok(stream)
    }

    /// Retrieves a single embeddings vector via `/api/embeddings`.
    #[instrument(skip_all, fields(model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            prompt: input,
        };

        debug!(input_len = input.len(), "POST {}", self.url_embeddings);
        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        let resp = self.check_status(resp, &self.url_embeddings).await?;

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            ProviderError::new(
                LlmProvider::Ollama,
                ProviderErrorKind::Decode(format!("serde error: {e}; expected `embedding`")),
            )
        })?;
        Ok(out.embedding)
    }

    async fn check_status(
        &self,
        resp: reqwest::Response,
        url: &str,
    ) -> Result<reqwest::Response, AiLlmError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let snippet = make_snippet(&resp.text().await.unwrap_or_default());
        error!(%status, %url, %snippet, "Ollama returned non-success status");
        Err(ProviderError::new(
            LlmProvider::Ollama,
            ProviderErrorKind::HttpStatus(HttpError {
                status,
                url: url.to_string(),
                snippet,
            }),
        )
        .into())
    }
}

/* ===========================================================================
HTTP payloads & options
======================================================================== */

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

impl<'a> ChatRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, messages: &'a [ChatMessage], stream: bool) -> Self {
        let options = ChatOptions {
            num_predict: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        };
        let empty = options.num_predict.is_none()
            && options.temperature.is_none()
            && options.top_p.is_none();
        Self {
            model: &cfg.model,
            messages,
            stream,
            options: (!empty).then_some(options),
        }
    }
}

/// Subset of Ollama generation options.
#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_maps_options() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".into(),
            endpoint: "http://localhost:11434".into(),
            api_key: None,
            api_version: None,
            max_tokens: Some(64),
            temperature: Some(0.0),
            top_p: None,
            timeout_secs: None,
        };
        let msgs = [ChatMessage::system("sys"), ChatMessage::user("q")];
        let body = serde_json::to_value(ChatRequest::from_cfg(&cfg, &msgs, true)).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["options"]["num_predict"], 64);
        assert!(body["options"].get("top_p").is_none());
        assert_eq!(body["messages"][1]["content"], "q");
    }
}
