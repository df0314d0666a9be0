use std::sync::Arc;

use ai_llm_service::LlmServiceProfiles;
use ai_llm_service::error_handler::{AiLlmError, ConfigError, EnvSource, opt_var};
use contextor::RagChain;

use super::chat_store::ChatStore;

/// How `/chats/{name}/questions` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    /// Reformulate, retrieve, answer from context.
    #[default]
    Grounded,
    /// Persona chat, no retrieval.
    Plain,
}

impl ChatMode {
    /// Reads `CHAT_MODE` (`grounded` when unset).
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, AiLlmError> {
        match opt_var(env, "CHAT_MODE").map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("grounded") | Some("rag") => Ok(ChatMode::Grounded),
            Some("plain") => Ok(ChatMode::Plain),
            Some(_) => Err(ConfigError::InvalidFormat {
                var: "CHAT_MODE",
                reason: "expected `grounded` or `plain`",
            }
            .into()),
        }
    }
}

/// Shared state for all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub chain: RagChain,
    pub chats: ChatStore,
    pub mode: ChatMode,
    /// Probed by `/health`; `None` when the chain runs on a local model.
    pub llm: Option<Arc<LlmServiceProfiles>>,
}

impl AppState {
    pub fn new(chain: RagChain, mode: ChatMode) -> Self {
        Self {
            chain,
            chats: ChatStore::new(),
            mode,
            llm: None,
        }
    }

    pub fn with_llm(mut self, llm: Arc<LlmServiceProfiles>) -> Self {
        self.llm = Some(llm);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn chat_mode_defaults_to_grounded() {
        assert_eq!(ChatMode::from_env(&env(&[])).unwrap(), ChatMode::Grounded);
        assert_eq!(
            ChatMode::from_env(&env(&[("CHAT_MODE", " Plain ")])).unwrap(),
            ChatMode::Plain
        );
        assert!(ChatMode::from_env(&env(&[("CHAT_MODE", "wild")])).unwrap_err().is_config());
    }
}
