//! Startup configuration, resolved once before any network call.

use std::path::PathBuf;

use ai_llm_service::LlmModelConfig;
use ai_llm_service::config::default_config::{config_chat, config_embedding};
use ai_llm_service::error_handler::{EnvSource, opt_var};
use anyhow::{Context, Result};
use api::ChatMode;
use contextor::ContextorConfig;
use rag_store::RagConfig;

pub const DEFAULT_DOCUMENT: &str = "data/History.txt";
pub const DEFAULT_API_ADDRESS: &str = "127.0.0.1:8080";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chat: LlmModelConfig,
    pub embedding: LlmModelConfig,
    pub rag: RagConfig,
    pub contextor: ContextorConfig,
    /// `DOCUMENT_PATH`: the single text corpus.
    pub document_path: PathBuf,
    /// `API_ADDRESS`: bind address for `serve`.
    pub api_address: String,
    /// `CHAT_MODE`
    pub chat_mode: ChatMode,
}

impl AppConfig {
    /// # Errors
    /// The first missing or malformed variable, named in the message.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        Ok(Self {
            chat: config_chat(env).context("chat model configuration")?,
            embedding: config_embedding(env).context("embedding model configuration")?,
            rag: RagConfig::from_env(env).context("vector store configuration")?,
            contextor: ContextorConfig::from_env(env).context("retrieval configuration")?,
            document_path: opt_var(env, "DOCUMENT_PATH")
                .unwrap_or_else(|| DEFAULT_DOCUMENT.to_string())
                .into(),
            api_address: opt_var(env, "API_ADDRESS").unwrap_or_else(|| DEFAULT_API_ADDRESS.to_string()),
            chat_mode: ChatMode::from_env(env)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ai_llm_service::LlmProvider;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn azure_and_jina() -> Vec<(&'static str, &'static str)> {
        vec![
            ("AZURE_OPENAI_API_KEY", "secret"),
            ("AZURE_OPENAI_ENDPOINT", "https://example.openai.azure.com"),
            ("OPENAI_API_VERSION", "2024-02-01"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o"),
            ("JINAAI_API_KEY", "jina-secret"),
            ("QDRANT_URL", "http://localhost:6334"),
        ]
    }

    #[test]
    fn original_deployment_variables_are_enough() {
        let cfg = AppConfig::from_env(&env(&azure_and_jina())).unwrap();
        assert_eq!(cfg.chat.provider, LlmProvider::AzureOpenAI);
        assert_eq!(cfg.embedding.provider, LlmProvider::Jina);
        assert_eq!(cfg.rag.collection, "langchain_vector");
        assert_eq!(cfg.document_path, PathBuf::from("data/History.txt"));
        assert_eq!(cfg.api_address, "127.0.0.1:8080");
        assert_eq!(cfg.chat_mode, ChatMode::Grounded);
        assert_eq!(cfg.contextor.search.top_k, 3);
    }

    #[test]
    fn missing_vector_store_url_is_named() {
        let mut vars = azure_and_jina();
        vars.retain(|(k, _)| *k != "QDRANT_URL");
        let err = AppConfig::from_env(&env(&vars)).unwrap_err();
        assert!(format!("{err:#}").contains("QDRANT_URL"));
    }

    #[test]
    fn missing_chat_key_fails_before_anything_else() {
        let mut vars = azure_and_jina();
        vars.retain(|(k, _)| *k != "AZURE_OPENAI_API_KEY");
        let err = AppConfig::from_env(&env(&vars)).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("chat model configuration"));
        assert!(msg.contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn overrides_are_applied() {
        let mut vars = azure_and_jina();
        vars.extend([
            ("DOCUMENT_PATH", "corpus/soil.txt"),
            ("API_ADDRESS", "0.0.0.0:9000"),
            ("CHAT_MODE", "plain"),
            ("RAG_TOP_K", "5"),
        ]);
        let cfg = AppConfig::from_env(&env(&vars)).unwrap();
        assert_eq!(cfg.document_path, PathBuf::from("corpus/soil.txt"));
        assert_eq!(cfg.api_address, "0.0.0.0:9000");
        assert_eq!(cfg.chat_mode, ChatMode::Plain);
        assert_eq!(cfg.contextor.search.top_k, 5);
    }
}
