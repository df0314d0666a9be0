//! Runtime configuration loaded from environment variables.

use ai_llm_service::error_handler::{EnvSource, ProcessEnv, opt_f32, opt_u32, opt_var};
use rag_store::{SearchParams, parse_bool};

use crate::error::ContextorError;

/// Retrieval and reformulation knobs. All fields have defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContextorConfig {
    /// `RAG_TOP_K` / `RAG_SCORE_THRESHOLD`.
    pub search: SearchParams,
    /// `REFORMULATE_EMPTY_HISTORY`: call the model even without history.
    pub reformulate_empty_history: bool,
}

impl Default for ContextorConfig {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            reformulate_empty_history: false,
        }
    }
}

impl ContextorConfig {
    /// Build from environment variables with defaults.
    ///
    /// # Errors
    /// [`ContextorError::Config`] for unparsable values, `top_k == 0`, or a
    /// threshold outside `[-1, 1]`.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, ContextorError> {
        let mut cfg = Self::default();
        if let Some(k) = opt_u32(env, "RAG_TOP_K")? {
            cfg.search.top_k = k as usize;
        }
        if let Some(t) = opt_f32(env, "RAG_SCORE_THRESHOLD")? {
            cfg.search.score_threshold = t;
        }
        if let Some(flag) = opt_var(env, "REFORMULATE_EMPTY_HISTORY") {
            cfg.reformulate_empty_history = parse_bool("REFORMULATE_EMPTY_HISTORY", &flag)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_process_env() -> Result<Self, ContextorError> {
        Self::from_env(&ProcessEnv)
    }

    pub fn validate(&self) -> Result<(), ContextorError> {
        if self.search.top_k == 0 {
            return Err(ContextorError::Config("RAG_TOP_K must be > 0".into()));
        }
        let t = self.search.score_threshold;
        if !(-1.0..=1.0).contains(&t) {
            return Err(ContextorError::Config(format!(
                "RAG_SCORE_THRESHOLD must be within [-1, 1], got {t}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::FailureKind;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_are_three_and_half() {
        let cfg = ContextorConfig::from_env(&env(&[])).unwrap();
        assert_eq!(cfg.search.top_k, 3);
        assert_eq!(cfg.search.score_threshold, 0.5);
        assert!(!cfg.reformulate_empty_history);
    }

    #[test]
    fn overrides_and_validation() {
        let cfg = ContextorConfig::from_env(&env(&[
            ("RAG_TOP_K", "5"),
            ("RAG_SCORE_THRESHOLD", "0.25"),
            ("REFORMULATE_EMPTY_HISTORY", "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.search.top_k, 5);
        assert!(cfg.reformulate_empty_history);

        let err = ContextorConfig::from_env(&env(&[("RAG_SCORE_THRESHOLD", "2")])).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Configuration);
        let err = ContextorConfig::from_env(&env(&[("RAG_TOP_K", "many")])).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Configuration);
    }
}
