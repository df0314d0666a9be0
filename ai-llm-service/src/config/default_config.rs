//! Default LLM configs loaded strictly from environment variables.
//!
//! Two roles are resolved here:
//!
//! - **Chat**      → answers and query reformulation (`LLM_KIND`)
//! - **Embedding** → vectors for chunks and questions (`EMBEDDING_KIND`)
//!
//! # Environment variables
//!
//! Common:
//! - `LLM_KIND` = `azure` (default) | `openai` | `ollama`
//! - `LLM_MAX_TOKENS`, `LLM_TEMPERATURE` (default `0.0`), `LLM_TIMEOUT_SECS`
//!
//! Azure OpenAI:
//! - `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_ENDPOINT`
//! - `OPENAI_API_VERSION` or `AZURE_OPENAI_API_VERSION`
//! - `AZURE_OPENAI_DEPLOYMENT_NAME` or `OPENAI_MODEL`
//!
//! OpenAI:
//! - `OPENAI_API_KEY`, `OPENAI_MODEL`, optional `OPENAI_BASE_URL`
//!
//! Ollama:
//! - `OLLAMA_URL` or `OLLAMA_PORT`, `OLLAMA_MODEL`
//!
//! Embeddings:
//! - `EMBEDDING_KIND` = `jina` (default) | `openai` | `ollama`
//! - `JINAAI_API_KEY` (jina), `EMBEDDING_MODEL` (default `jina-embeddings-v2-base-en`)

use crate::{
    config::{llm_model_config::LlmModelConfig, llm_provider::LlmProvider},
    error_handler::{
        ConfigError, EnvSource, ProcessEnv, Result, must_var, opt_f32, opt_u32, opt_u64, opt_var,
        validate_http_endpoint, validate_range_f32,
    },
};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_JINA_BASE_URL: &str = "https://api.jina.ai";
pub const DEFAULT_EMBEDDING_MODEL: &str = "jina-embeddings-v2-base-en";

/// Resolves the Ollama endpoint.
///
/// Precedence:
/// 1. `OLLAMA_URL` if present and non-empty
/// 2. `OLLAMA_PORT` → `http://localhost:{port}`
fn ollama_endpoint(env: &dyn EnvSource) -> Result<String> {
    if let Some(url) = opt_var(env, "OLLAMA_URL") {
        validate_http_endpoint("OLLAMA_URL", &url)?;
        return Ok(url);
    }
    if let Some(port) = opt_var(env, "OLLAMA_PORT") {
        port.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
            var: "OLLAMA_PORT",
            reason: "expected u16 (1..=65535)",
        })?;
        return Ok(format!("http://localhost:{port}"));
    }
    Err(ConfigError::MissingVar("OLLAMA_URL or OLLAMA_PORT").into())
}

fn first_of(env: &dyn EnvSource, names: &[&'static str], missing: &'static str) -> Result<String> {
    names
        .iter()
        .find_map(|n| opt_var(env, n))
        .ok_or_else(|| ConfigError::MissingVar(missing).into())
}

fn kind(env: &dyn EnvSource, var: &'static str, default: LlmProvider) -> Result<LlmProvider> {
    match opt_var(env, var) {
        Some(k) => Ok(LlmProvider::parse(&k)?),
        None => Ok(default),
    }
}

/// Chat model config selected by `LLM_KIND`.
///
/// # Defaults
/// - `temperature = 0.0` (deterministic answers)
/// - `timeout_secs = 120`
///
/// # Errors
/// Missing or malformed variables for the selected provider.
pub fn config_chat(env: &dyn EnvSource) -> Result<LlmModelConfig> {
    let provider = kind(env, "LLM_KIND", LlmProvider::AzureOpenAI)?;
    let max_tokens = opt_u32(env, "LLM_MAX_TOKENS")?;
    let temperature = opt_f32(env, "LLM_TEMPERATURE")?.unwrap_or(0.0);
    validate_range_f32("temperature", temperature, 0.0, 2.0)?;
    let timeout_secs = opt_u64(env, "LLM_TIMEOUT_SECS")?.unwrap_or(120);

    let (model, endpoint, api_key, api_version) = match provider {
        LlmProvider::AzureOpenAI => {
            let endpoint = must_var(env, "AZURE_OPENAI_ENDPOINT")?;
            validate_http_endpoint("AZURE_OPENAI_ENDPOINT", &endpoint)?;
            (
                first_of(
                    env,
                    &["AZURE_OPENAI_DEPLOYMENT_NAME", "OPENAI_MODEL"],
                    "AZURE_OPENAI_DEPLOYMENT_NAME or OPENAI_MODEL",
                )?,
                endpoint,
                Some(must_var(env, "AZURE_OPENAI_API_KEY")?),
                Some(first_of(
                    env,
                    &["OPENAI_API_VERSION", "AZURE_OPENAI_API_VERSION"],
                    "OPENAI_API_VERSION or AZURE_OPENAI_API_VERSION",
                )?),
            )
        }
        LlmProvider::OpenAI => {
            let endpoint = opt_var(env, "OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
            validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;
            (
                must_var(env, "OPENAI_MODEL")?,
                endpoint,
                Some(must_var(env, "OPENAI_API_KEY")?),
                None,
            )
        }
        LlmProvider::Ollama => (must_var(env, "OLLAMA_MODEL")?, ollama_endpoint(env)?, None, None),
        LlmProvider::Jina => {
            return Err(ConfigError::UnsupportedRole {
                provider,
                role: "chat",
            }
            .into());
        }
    };

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        api_version,
        max_tokens,
        temperature: Some(temperature),
        top_p: None,
        timeout_secs: Some(timeout_secs),
    })
}

/// Embedding model config selected by `EMBEDDING_KIND`.
///
/// # Errors
/// Missing or malformed variables for the selected provider.
pub fn config_embedding(env: &dyn EnvSource) -> Result<LlmModelConfig> {
    let provider = kind(env, "EMBEDDING_KIND", LlmProvider::Jina)?;
    let model = opt_var(env, "EMBEDDING_MODEL");

    let (model, endpoint, api_key) = match provider {
        LlmProvider::Jina => (
            model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            DEFAULT_JINA_BASE_URL.to_string(),
            Some(must_var(env, "JINAAI_API_KEY")?),
        ),
        LlmProvider::OpenAI => {
            let endpoint = opt_var(env, "OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
            validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;
            (
                model.ok_or(ConfigError::MissingVar("EMBEDDING_MODEL"))?,
                endpoint,
                Some(must_var(env, "OPENAI_API_KEY")?),
            )
        }
        LlmProvider::Ollama => (
            model.ok_or(ConfigError::MissingVar("EMBEDDING_MODEL"))?,
            ollama_endpoint(env)?,
            None,
        ),
        LlmProvider::AzureOpenAI => {
            return Err(ConfigError::UnsupportedRole {
                provider,
                role: "embeddings",
            }
            .into());
        }
    };

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        api_version: None,
        max_tokens: None,
        temperature: None,
        top_p: None,
        timeout_secs: Some(30),
    })
}

/// [`config_chat`] over the process environment.
pub fn config_chat_from_env() -> Result<LlmModelConfig> {
    config_chat(&ProcessEnv)
}

/// [`config_embedding`] over the process environment.
pub fn config_embedding_from_env() -> Result<LlmModelConfig> {
    config_embedding(&ProcessEnv)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn azure_is_the_default_chat_provider() {
        let e = env(&[
            ("AZURE_OPENAI_API_KEY", "k"),
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("OPENAI_API_VERSION", "2024-06-01"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]);
        let cfg = config_chat(&e).unwrap();
        assert_eq!(cfg.provider, LlmProvider::AzureOpenAI);
        assert_eq!(cfg.model, "gpt-4o");
        assert_eq!(cfg.api_version.as_deref(), Some("2024-06-01"));
        assert_eq!(cfg.temperature, Some(0.0));
    }

    #[test]
    fn deployment_name_wins_over_model() {
        let e = env(&[
            ("AZURE_OPENAI_API_KEY", "k"),
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_API_VERSION", "2024-06-01"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "chat-deploy"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]);
        assert_eq!(config_chat(&e).unwrap().model, "chat-deploy");
    }

    #[test]
    fn missing_azure_key_names_the_variable() {
        let e = env(&[
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("OPENAI_API_VERSION", "2024-06-01"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]);
        let err = config_chat(&e).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn ollama_port_builds_local_endpoint() {
        let e = env(&[
            ("LLM_KIND", "ollama"),
            ("OLLAMA_PORT", "11434"),
            ("OLLAMA_MODEL", "llama3"),
        ]);
        let cfg = config_chat(&e).unwrap();
        assert_eq!(cfg.endpoint, "http://localhost:11434");
        assert_eq!(cfg.api_key, None);
    }

    #[test]
    fn jina_cannot_chat() {
        let e = env(&[("LLM_KIND", "jina")]);
        assert!(config_chat(&e).is_err());
    }

    #[test]
    fn jina_embeddings_default_model() {
        let e = env(&[("JINAAI_API_KEY", "jk")]);
        let cfg = config_embedding(&e).unwrap();
        assert_eq!(cfg.provider, LlmProvider::Jina);
        assert_eq!(cfg.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(cfg.endpoint, DEFAULT_JINA_BASE_URL);
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let e = env(&[
            ("LLM_KIND", "ollama"),
            ("OLLAMA_URL", "http://localhost:11434"),
            ("OLLAMA_MODEL", "llama3"),
            ("LLM_TEMPERATURE", "7"),
        ]);
        assert!(config_chat(&e).is_err());
    }
}
