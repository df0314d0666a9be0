//! Unified error handling for `ai-llm-service`.
//!
//! This module exposes a single top-level error type [`AiLlmError`] for the whole
//! library, and groups domain-specific errors in nested types ([`ConfigError`],
//! [`HealthError`], [`ProviderError`]). Helpers for reading/validating
//! environment variables go through [`EnvSource`] so configuration can be
//! resolved from the process environment or from a fixed map in tests.
//!
//! All messages include the prefix `[AI LLM Service]` to simplify attribution in logs.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::llm_provider::LlmProvider;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, AiLlmError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `ai-llm-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AiLlmError {
    /// Configuration/validation errors (startup/readiness).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Health-check/connectivity/decoding errors.
    #[error(transparent)]
    Health(#[from] HealthError),

    /// A provider call failed (status, decode, empty answer, broken stream).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Underlying HTTP transport error (e.g., `reqwest::Error`).
    #[error("[AI LLM Service] transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),

    /// Operation exceeded the configured timeout.
    #[error("[AI LLM Service] operation timed out after {0:?}")]
    Timeout(Duration),
}

impl AiLlmError {
    /// `true` for errors raised while resolving configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, AiLlmError::Config(_))
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable is missing or empty.
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// A number failed to parse (like ports, limits, timeouts).
    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `LLM_MAX_TOKENS`, `OLLAMA_PORT`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u32`).
        reason: &'static str,
    },

    /// Unsupported provider in `LLM_KIND` / `EMBEDDING_KIND`.
    #[error("[AI LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Provider exists but cannot serve this role (e.g. Jina for chat).
    #[error("[AI LLM Service] provider {provider:?} cannot be used for {role}")]
    UnsupportedRole {
        provider: LlmProvider,
        role: &'static str,
    },

    /// Value had the wrong format (e.g., invalid URL).
    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `OLLAMA_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// A numeric field was outside of the allowed range.
    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange {
        /// Field name (e.g., `temperature`).
        field: &'static str,
        /// Description of the expected range.
        detail: &'static str,
    },
}

/* ------------------------------------------------------------------------- */
/* Provider errors                                                           */
/* ------------------------------------------------------------------------- */

/// Non-success HTTP answer from an upstream service.
#[derive(Debug, Error)]
#[error("HTTP {status} from {url}: {snippet}")]
pub struct HttpError {
    /// Numeric HTTP status code.
    pub status: StatusCode,
    /// Request URL.
    pub url: String,
    /// Short snippet of the response body (trimmed).
    pub snippet: String,
}

/// What went wrong when talking to a provider.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    #[error("client constructed for a different provider")]
    InvalidProvider,
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error(transparent)]
    HttpStatus(HttpError),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("response contained no choices")]
    EmptyChoices,
    #[error("stream interrupted: {0}")]
    Stream(String),
}

/// Provider-attributed failure.
#[derive(Debug, Error)]
#[error("[AI LLM Service] {provider:?}: {kind}")]
pub struct ProviderError {
    pub provider: LlmProvider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: LlmProvider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

/* ------------------------------------------------------------------------- */
/* Health errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for provider health checks.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum HealthError {
    /// Upstream returned a non-successful HTTP status.
    #[error("[AI LLM Service] health probe failed: {0}")]
    HttpStatus(HttpError),

    /// Response payload could not be decoded as expected.
    #[error("[AI LLM Service] decode error: {0}")]
    Decode(String),
}

/// Keeps the first 240 characters of a response body for error messages.
pub fn make_snippet(text: &str) -> String {
    text.trim().chars().take(240).collect()
}

/* ------------------------------------------------------------------------- */
/* Env helpers (return unified `Result<T>`)                                  */
/* ------------------------------------------------------------------------- */

/// Source of configuration variables.
pub trait EnvSource {
    /// Returns the raw value of `name`, if set.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Returns a set, non-blank variable (trimmed).
pub fn opt_var(env: &dyn EnvSource, name: &str) -> Option<String> {
    env.var(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fetches a required, non-empty variable.
///
/// # Errors
/// Returns [`AiLlmError::Config`] with [`ConfigError::MissingVar`] if the
/// variable is absent or empty.
pub fn must_var(env: &dyn EnvSource, name: &'static str) -> Result<String> {
    opt_var(env, name).ok_or_else(|| ConfigError::MissingVar(name).into())
}

/// Parses an optional `u32` (`Ok(None)` if unset/empty).
///
/// # Errors
/// [`ConfigError::InvalidNumber`] if the variable is set but not a valid `u32`.
pub fn opt_u32(env: &dyn EnvSource, name: &'static str) -> Result<Option<u32>> {
    opt_parse(env, name, "expected u32")
}

/// Parses an optional `u64` (`Ok(None)` if unset/empty).
pub fn opt_u64(env: &dyn EnvSource, name: &'static str) -> Result<Option<u64>> {
    opt_parse(env, name, "expected u64")
}

/// Parses an optional `f32` (`Ok(None)` if unset/empty).
pub fn opt_f32(env: &dyn EnvSource, name: &'static str) -> Result<Option<f32>> {
    opt_parse(env, name, "expected floating point number")
}

fn opt_parse<T: std::str::FromStr>(
    env: &dyn EnvSource,
    name: &'static str,
    reason: &'static str,
) -> Result<Option<T>> {
    match opt_var(env, name) {
        Some(v) => v
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var: name, reason }.into()),
        None => Ok(None),
    }
}

/* ------------------------------------------------------------------------- */
/* Validation helpers (return unified `Result<T>`)                           */
/* ------------------------------------------------------------------------- */

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// [`ConfigError::InvalidFormat`] when the string does not start with a valid
/// HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}

/// Validates that a floating-point value lies within an inclusive range.
///
/// # Errors
/// [`ConfigError::OutOfRange`] if `value` is outside `[min, max]`.
pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        }
        .into())
    }
}
