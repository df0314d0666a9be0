//! Universal health service for LLM backends.
//!
//! Lightweight probes per provider:
//! - Ollama: `GET {endpoint}/api/tags` (best-effort model existence check)
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth (best-effort model existence check)
//! - Azure OpenAI: `GET {endpoint}/openai/models?api-version=…` with `api-key` (reachability + auth)
//! - Jina: `GET {endpoint}/v1/models` with Bearer auth (reachability + auth)
//!
//! The returned [`HealthStatus`] is JSON-serializable and suitable for a `/health` endpoint.
//! [`HealthService::check`] is resilient and never fails (errors mapped to `ok=false`).

use std::time::{Duration, Instant};

use reqwest::header;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{AiLlmError, HealthError, HttpError, make_snippet};

/// A serializable health snapshot for a single provider/config.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Backend/provider (e.g., "Ollama", "AzureOpenAI").
    pub provider: String,
    /// Target endpoint base URL.
    pub endpoint: String,
    /// Model identifier relevant to the probe.
    pub model: Option<String>,
    /// Overall health flag.
    pub ok: bool,
    /// Measured HTTP latency in milliseconds for the probe.
    pub latency_ms: u128,
    /// Short human-readable message with details.
    pub message: String,
}

impl HealthStatus {
    fn new(cfg: &LlmModelConfig, ok: bool, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: format!("{:?}", cfg.provider),
            endpoint: cfg.endpoint.clone(),
            model: Some(cfg.model.clone()),
            ok,
            latency_ms,
            message: message.into(),
        }
    }
}

/// How a provider's model listing names its entries.
#[derive(Debug, Clone, Copy)]
enum ModelList {
    /// `{ "models": [ { "name": … } ] }`
    OllamaTags,
    /// `{ "data": [ { "id": … } ] }`
    OpenAiData,
    /// Listing is not comparable to the configured name; reachability only.
    Skip,
}

/// A universal health checker that reuses a single HTTP client.
pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    /// Creates a new health service with an optional client timeout (seconds).
    ///
    /// # Errors
    /// Returns [`AiLlmError::HttpTransport`] if the HTTP client cannot be built.
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        debug!(default_timeout_secs = timeout.as_secs(), "HealthService initialized");

        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }

    /// Checks health for a single LLM config.
    ///
    /// Never returns an error: any failure becomes `HealthStatus { ok: false, .. }`.
    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let endpoint = cfg.endpoint.trim();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            warn!(provider = ?cfg.provider, endpoint = %cfg.endpoint, "invalid endpoint");
            return HealthStatus::new(cfg, false, 0, "endpoint is empty or missing http/https");
        }

        let start = Instant::now();
        match self.try_probe(cfg).await {
            Ok(status) => {
                info!(
                    provider = %status.provider,
                    model = %cfg.model,
                    ok = status.ok,
                    latency_ms = status.latency_ms,
                    "health probe completed"
                );
                status
            }
            Err(err) => {
                let status = HealthStatus::new(cfg, false, start.elapsed().as_millis(), err.to_string());
                warn!(
                    provider = %status.provider,
                    model = %cfg.model,
                    latency_ms = status.latency_ms,
                    message = %status.message,
                    "health probe failed"
                );
                status
            }
        }
    }

    /// Checks health for multiple configs, in order.
    pub async fn check_many(&self, configs: &[LlmModelConfig]) -> Vec<HealthStatus> {
        debug!(count = configs.len(), "running batch health probes");
        let mut out = Vec::with_capacity(configs.len());
        for cfg in configs {
            out.push(self.check(cfg).await);
        }
        out
    }

    /// Strict probe. Returns an error on transport failures and non-2xx answers.
    async fn try_probe(&self, cfg: &LlmModelConfig) -> Result<HealthStatus, AiLlmError> {
        let (url, list) = probe_target(cfg)?;
        let timeout = cfg
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let mut req = self.client.get(&url).timeout(timeout);
        if let Some(key) = &cfg.api_key {
            req = match cfg.provider {
                LlmProvider::AzureOpenAI => req.header("api-key", key),
                _ => req.header(header::AUTHORIZATION, format!("Bearer {key}")),
            };
        }

        let start = Instant::now();
        debug!(provider = ?cfg.provider, model = %cfg.model, "GET {}", url);
        let resp = req.send().await?;
        let latency = start.elapsed().as_millis();

        if !resp.status().is_success() {
            let status = resp.status();
            let snippet = make_snippet(&resp.text().await.unwrap_or_default());
            return Err(HealthError::HttpStatus(HttpError {
                status,
                url,
                snippet,
            })
            .into());
        }

        if matches!(list, ModelList::Skip) {
            return Ok(HealthStatus::new(cfg, true, latency, "reachable; credentials accepted"));
        }

        let body: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!(provider = ?cfg.provider, error = %e, "failed to decode model list; treating server as reachable");
                return Ok(HealthStatus::new(
                    cfg,
                    true,
                    latency,
                    format!("reachable; failed to decode model list: {e}"),
                ));
            }
        };

        Ok(match model_listed(&body, list, &cfg.model) {
            Some(true) => HealthStatus::new(cfg, true, latency, "healthy; model is available"),
            Some(false) => HealthStatus::new(cfg, false, latency, "up, but model not found"),
            None => HealthStatus::new(cfg, true, latency, "healthy; model list unavailable"),
        })
    }
}

fn probe_target(cfg: &LlmModelConfig) -> Result<(String, ModelList), AiLlmError> {
    let base = cfg.endpoint.trim().trim_end_matches('/');
    Ok(match cfg.provider {
        LlmProvider::Ollama => (format!("{base}/api/tags"), ModelList::OllamaTags),
        LlmProvider::OpenAI => (format!("{base}/v1/models"), ModelList::OpenAiData),
        LlmProvider::Jina => (format!("{base}/v1/models"), ModelList::Skip),
        LlmProvider::AzureOpenAI => {
            let version = cfg
                .api_version
                .as_deref()
                .ok_or_else(|| HealthError::Decode("missing Azure api-version".into()))?;
            (
                format!("{base}/openai/models?api-version={version}"),
                ModelList::Skip,
            )
        }
    })
}

/// `None` when the listing has an unexpected shape.
fn model_listed(body: &Value, list: ModelList, model: &str) -> Option<bool> {
    let (field, key) = match list {
        ModelList::OllamaTags => ("models", "name"),
        ModelList::OpenAiData => ("data", "id"),
        ModelList::Skip => return None,
    };
    let items = body.get(field)?.as_array()?;
    Some(items.iter().filter_map(|m| m.get(key)?.as_str()).any(|name| {
        // Ollama reports untagged models as `name:latest`.
        name == model || name.strip_suffix(":latest") == Some(model)
    }))
}
