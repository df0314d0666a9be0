use crate::error_handler::ConfigError;

/// Represents the provider (backend) used for chat completion or embeddings.
///
/// `OpenAI`, `AzureOpenAI` and `Jina` share the OpenAI wire format and are
/// served by [`OpenAiService`](crate::services::open_ai_service::OpenAiService);
/// `Ollama` has its own client.
///
/// # Examples
///
/// ```
/// use ai_llm_service::LlmProvider;
///
/// assert_eq!(LlmProvider::parse("azure").unwrap(), LlmProvider::AzureOpenAI);
/// assert!(LlmProvider::parse("nope").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LlmProvider {
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI public API.
    OpenAI,
    /// Azure-hosted OpenAI deployment (`api-key` header, `api-version` query).
    AzureOpenAI,
    /// Jina AI embeddings API.
    Jina,
}

impl LlmProvider {
    /// Parses a provider kind as used in `LLM_KIND` / `EMBEDDING_KIND`
    /// (case-insensitive).
    ///
    /// # Errors
    /// [`ConfigError::UnsupportedProvider`] for unknown names.
    pub fn parse(kind: &str) -> Result<Self, ConfigError> {
        match kind.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "chatgpt" => Ok(Self::OpenAI),
            "azure" | "azure_openai" | "azureopenai" => Ok(Self::AzureOpenAI),
            "jina" | "jinaai" => Ok(Self::Jina),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }

    /// Whether this provider speaks the OpenAI REST dialect.
    pub fn is_openai_compatible(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}
