//! Client for OpenAI-compatible REST APIs (OpenAI, Azure OpenAI, Jina).
//!
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - OpenAI / Jina: `POST {endpoint}/v1/chat/completions`, `POST {endpoint}/v1/embeddings`
//! - Azure: `POST {endpoint}/openai/deployments/{model}/chat/completions?api-version=…`
//!   (and `/embeddings` likewise); `model` is the deployment name
//!
//! Constructor validation:
//! - `cfg.provider` must be OpenAI-compatible
//! - `cfg.api_key` must be present (and `cfg.api_version` for Azure)
//! - `cfg.endpoint` must start with http:// or https://
//!
//! Errors are normalized via unified error types in `error_handler`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use crate::{
    chat::{ChatMessage, ChatStream},
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{AiLlmError, HttpError, ProviderError, ProviderErrorKind, make_snippet},
    services::stream_decode::{decode_openai_sse_line, pump},
};

const STREAM_CAPACITY: usize = 64;

/// Thin client for the OpenAI wire format.
///
/// Constructed from a complete [`LlmModelConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` (with timeout and auth headers).
///
/// High-level operations:
/// - [`OpenAiService::chat`]        — single, non-streaming chat completion
/// - [`OpenAiService::chat_stream`] — token-streamed chat completion
/// - [`OpenAiService::embeddings`]  — single embeddings vector retrieval
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] with `InvalidProvider` if `cfg.provider` is Ollama
    /// - [`AiLlmError::Provider`] with `MissingApiKey` if `cfg.api_key` is `None`
    /// - [`AiLlmError::Provider`] with `InvalidEndpoint` if the endpoint is invalid
    ///   or Azure has no `api_version`
    /// - [`AiLlmError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        let provider = cfg.provider;
        if !provider.is_openai_compatible() {
            return Err(ProviderError::new(provider, ProviderErrorKind::InvalidProvider).into());
        }

        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::new(provider, ProviderErrorKind::MissingApiKey))?;

        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ProviderError::new(
                provider,
                ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone()),
            )
            .into());
        }
        let (url_chat, url_embeddings) = build_urls(&cfg)?;

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(60));

        let auth = match provider {
            LlmProvider::AzureOpenAI => (header::HeaderName::from_static("api-key"), api_key),
            _ => (header::AUTHORIZATION, format!("Bearer {api_key}")),
        };
        let mut auth_value = header::HeaderValue::from_str(&auth.1).map_err(|e| {
            ProviderError::new(
                provider,
                ProviderErrorKind::Decode(format!("invalid API key header: {e}")),
            )
        })?;
        auth_value.set_sensitive(true);

        let mut headers = header::HeaderMap::new();
        headers.insert(auth.0, auth_value);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        info!(
            provider = ?cfg.provider,
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = timeout.as_secs(),
            "OpenAiService initialized"
        );

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

    /// Performs a **non-streaming** chat completion request.
    ///
    /// Mapped options from config: `model` (not for Azure), `temperature`,
    /// `top_p`, `max_tokens`.
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] with `HttpStatus` for non-2xx responses
    /// - [`AiLlmError::HttpTransport`] for client/network failures
    /// - [`AiLlmError::Provider`] with `Decode` if the JSON cannot be parsed
    /// - [`AiLlmError::Provider`] with `EmptyChoices` if no content is returned
    #[instrument(skip_all, fields(provider = ?self.cfg.provider, model = %self.cfg.model))]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, messages, false);

        debug!(messages = messages.len(), "POST {}", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat, started).await?;

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            error!(error = %e, latency_ms = started.elapsed().as_millis(), "failed to decode chat completion");
            self.err(ProviderErrorKind::Decode(format!(
                "serde error: {e}; expected `choices[0].message.content`"
            )))
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| self.err(ProviderErrorKind::EmptyChoices))?;

        info!(
            latency_ms = started.elapsed().as_millis(),
            answer_len = content.len(),
            "chat completion completed"
        );

        Ok(content)
    }

    /// Starts a **streaming** chat completion (`stream: true`, SSE framing).
    ///
    /// Returns once the provider accepted the request; text increments are
    /// delivered through the returned [`ChatStream`].
    ///
    /// # Errors
    /// Same as [`OpenAiService::chat`] for failures before the first byte.
    #[instrument(skip_all, fields(provider = ?self.cfg.provider, model = %self.cfg.model))]
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<ChatStream, AiLlmError> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, messages, true);

        debug!(messages = messages.len(), "POST {} (stream)", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        let resp = self.check_status(resp, &self.url_chat, started).await?;

        let (tx, stream) = ChatStream::channel(self.cfg.provider, STREAM_CAPACITY);
        tokio::spawn(pump(resp, self.cfg.provider, decode_openai_sse_line, tx));

        info!(
            latency_ms = started.elapsed().as_millis(),
            "chat stream opened"
        );
        Ok(stream)
    }

    /// Retrieves a single embeddings vector.
    ///
    /// # Errors
    /// - [`AiLlmError::Provider`] with `HttpStatus` for non-2xx responses
    /// - [`AiLlmError::HttpTransport`] for client/network failures
    /// - [`AiLlmError::Provider`] with `Decode` if the JSON cannot be parsed
    #[instrument(skip_all, fields(provider = ?self.cfg.provider, model = %self.cfg.model))]
    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: (self.cfg.provider != LlmProvider::AzureOpenAI).then_some(self.cfg.model.as_str()),
            input: [input],
        };

        debug!(input_len = input.len(), "POST {}", self.url_embeddings);

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;
        let resp = self.check_status(resp, &self.url_embeddings, started).await?;

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            error!(error = %e, latency_ms = started.elapsed().as_millis(), "failed to decode embeddings");
            self.err(ProviderErrorKind::Decode(format!(
                "serde error: {e}; expected `data[0].embedding`"
            )))
        })?;

        let first = out.data.into_iter().next().ok_or_else(|| {
            self.err(ProviderErrorKind::Decode(
                "empty `data` in embeddings response".into(),
            ))
        })?;

        debug!(
            latency_ms = started.elapsed().as_millis(),
            dim = first.embedding.len(),
            "embeddings completed"
        );

        Ok(first.embedding)
    }

    async fn check_status(
        &self,
        resp: reqwest::Response,
        url: &str,
        started: Instant,
    ) -> Result<reqwest::Response, AiLlmError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let snippet = make_snippet(&text);

        error!(
            %status,
            %url,
            %snippet,
            latency_ms = started.elapsed().as_millis(),
            "provider returned non-success status"
        );

        Err(self.err(ProviderErrorKind::HttpStatus(HttpError {
            status,
            url: url.to_string(),
            snippet,
        })))
    }

    fn err(&self, kind: ProviderErrorKind) -> AiLlmError {
        ProviderError::new(self.cfg.provider, kind).into()
    }
}

/// Chat and embeddings URLs for the configured provider.
fn build_urls(cfg: &LlmModelConfig) -> Result<(String, String), AiLlmError> {
    let base = cfg.endpoint.trim().trim_end_matches('/');
    match cfg.provider {
        LlmProvider::AzureOpenAI => {
            let version = cfg.api_version.as_deref().ok_or_else(|| {
                ProviderError::new(
                    cfg.provider,
                    ProviderErrorKind::InvalidEndpoint("missing api-version".into()),
                )
            })?;
            let deployment = format!("{base}/openai/deployments/{}", cfg.model);
            Ok((
                format!("{deployment}/chat/completions?api-version={version}"),
                format!("{deployment}/embeddings?api-version={version}"),
            ))
        }
        _ => Ok((
            format!("{base}/v1/chat/completions"),
            format!("{base}/v1/embeddings"),
        )),
    }
}

/* ===========================================================================
HTTP payloads & options
======================================================================== */

/// Request body for `/chat/completions`.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, messages: &'a [ChatMessage], stream: bool) -> Self {
        Self {
            // Azure routes by deployment in the URL.
            model: (cfg.provider != LlmProvider::AzureOpenAI).then_some(cfg.model.as_str()),
            messages,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: LlmProvider) -> LlmModelConfig {
        LlmModelConfig {
            provider,
            model: "gpt-4o".into(),
            endpoint: "https://res.example.com/".into(),
            api_key: Some("k".into()),
            api_version: Some("2024-06-01".into()),
            max_tokens: None,
            temperature: Some(0.0),
            top_p: None,
            timeout_secs: Some(5),
        }
    }

    #[test]
    fn azure_urls_use_deployment_and_version() {
        let (chat, emb) = build_urls(&cfg(LlmProvider::AzureOpenAI)).unwrap();
        assert_eq!(
            chat,
            "https://res.example.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-06-01"
        );
        assert!(emb.ends_with("/openai/deployments/gpt-4o/embeddings?api-version=2024-06-01"));
    }

    #[test]
    fn openai_urls_are_versioned_paths() {
        let (chat, emb) = build_urls(&cfg(LlmProvider::OpenAI)).unwrap();
        assert_eq!(chat, "https://res.example.com/v1/chat/completions");
        assert_eq!(emb, "https://res.example.com/v1/embeddings");
    }

    #[test]
    fn azure_request_omits_model_and_stream_flag() {
        let c = cfg(LlmProvider::AzureOpenAI);
        let msgs = [ChatMessage::user("What are the different types of soil?")];
        let body = serde_json::to_value(ChatCompletionRequest::from_cfg(&c, &msgs, false)).unwrap();
        assert!(body.get("model").is_none());
        assert!(body.get("stream").is_none());
        assert_eq!(body["messages"][0]["role"], "user");

        let c = cfg(LlmProvider::OpenAI);
        let body = serde_json::to_value(ChatCompletionRequest::from_cfg(&c, &msgs, true)).unwrap();
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn ollama_config_is_rejected() {
        let mut c = cfg(LlmProvider::Ollama);
        c.api_key = None;
        assert!(OpenAiService::new(c).is_err());
    }
}
