use crate::config::llm_provider::LlmProvider;

/// Configuration for an LLM model invocation.
///
/// # Fields
///
/// - `provider`: which backend serves the requests.
/// - `model`: model identifier; for Azure this is the **deployment name**.
/// - `endpoint`: base URL of the provider (no trailing path).
/// - `api_key`: API key for hosted providers.
/// - `api_version`: Azure `api-version` query value.
/// - `max_tokens`: maximum number of tokens to generate (if supported).
/// - `temperature`: sampling temperature (0.0 = deterministic).
/// - `top_p`: nucleus sampling cutoff.
/// - `timeout_secs`: request timeout in seconds.
///
/// # Examples
///
/// ```
/// use ai_llm_service::{LlmModelConfig, LlmProvider};
///
/// let cfg = LlmModelConfig {
///     provider: LlmProvider::AzureOpenAI,
///     model: "gpt-4o-chat".to_string(),
///     endpoint: "https://my-resource.openai.azure.com".to_string(),
///     api_key: Some("secret".to_string()),
///     api_version: Some("2024-06-01".to_string()),
///     max_tokens: None,
///     temperature: Some(0.0),
///     top_p: None,
///     timeout_secs: Some(60),
/// };
/// assert_eq!(cfg.provider, LlmProvider::AzureOpenAI);
/// ```
#[derive(Clone, PartialEq)]
pub struct LlmModelConfig {
    /// The LLM provider/backend.
    pub provider: LlmProvider,

    /// Model identifier string (deployment name on Azure).
    pub model: String,

    /// Inference endpoint base URL.
    pub endpoint: String,

    /// Optional API key for authentication.
    pub api_key: Option<String>,

    /// Azure OpenAI `api-version`.
    pub api_version: Option<String>,

    /// Maximum number of tokens to generate.
    pub max_tokens: Option<u32>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for LlmModelConfig {
    // Keys never reach the logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("api_version", &self.api_version)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
