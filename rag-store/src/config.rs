//! Runtime, collection and chunking configuration.
//!
//! # Environment variables
//! - `QDRANT_URL` (required), `QDRANT_API_KEY`, `QDRANT_COLLECTION` (default `langchain_vector`)
//! - `QDRANT_BATCH_SIZE` (default 128), `RAG_EXACT_SEARCH` (default false)
//! - `EMBEDDING_DIM` (optional, enforced when set), `EMBEDDING_CONCURRENCY` (default 4)
//! - `CHUNK_SIZE` (default 200), `CHUNK_OVERLAP` (default 0), `CHUNK_STRATEGY` (`recursive` | `fixed`)

use ai_llm_service::error_handler::{EnvSource, ProcessEnv, must_var, opt_u32, opt_var};

use crate::chunk::{ChunkStrategy, validate};
use crate::errors::RagError;

pub const DEFAULT_COLLECTION: &str = "langchain_vector";

/// How documents are split before embedding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,
    /// Maximum chunk length in characters.
    pub size: usize,
    /// Characters shared by consecutive chunks (`< size`).
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::Recursive,
            size: 200,
            overlap: 0,
        }
    }
}

/// Configuration for ingestion and retrieval.
#[derive(Clone, Debug)]
pub struct RagConfig {
    /// Qdrant endpoint, e.g. `http://localhost:6334`.
    pub qdrant_url: String,
    /// Optional API key for Qdrant Cloud.
    pub qdrant_api_key: Option<String>,
    /// Target collection name.
    pub collection: String,
    /// Upsert batch size.
    pub upsert_batch: usize,
    /// Exact search flag (false = HNSW ANN).
    pub exact_search: bool,
    /// Enforced embedding dimension.
    pub embedding_dim: Option<usize>,
    /// Parallel embedding requests during ingestion.
    pub embedding_concurrency: usize,
    pub chunking: ChunkingConfig,
}

impl RagConfig {
    /// Creates a sane default config for a given collection name and Qdrant endpoint.
    pub fn new_default(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            qdrant_url: url.into(),
            qdrant_api_key: None,
            collection: collection.into(),
            upsert_batch: 128,
            exact_search: false,
            embedding_dim: None,
            embedding_concurrency: 4,
            chunking: ChunkingConfig::default(),
        }
    }

    /// Reads the configuration from `env`.
    ///
    /// # Errors
    /// `RagError::Config` naming the missing/invalid variable, or
    /// `RagError::InvalidChunking` when `CHUNK_OVERLAP >= CHUNK_SIZE`.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self, RagError> {
        let url = must_var(env, "QDRANT_URL")?;
        let collection =
            opt_var(env, "QDRANT_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        let mut cfg = Self::new_default(url, collection);

        cfg.qdrant_api_key = opt_var(env, "QDRANT_API_KEY");
        if let Some(n) = opt_u32(env, "QDRANT_BATCH_SIZE")? {
            cfg.upsert_batch = n as usize;
        }
        if let Some(flag) = opt_var(env, "RAG_EXACT_SEARCH") {
            cfg.exact_search = parse_bool("RAG_EXACT_SEARCH", &flag)?;
        }
        cfg.embedding_dim = opt_u32(env, "EMBEDDING_DIM")?.map(|d| d as usize);
        if let Some(n) = opt_u32(env, "EMBEDDING_CONCURRENCY")? {
            cfg.embedding_concurrency = n as usize;
        }

        if let Some(n) = opt_u32(env, "CHUNK_SIZE")? {
            cfg.chunking.size = n as usize;
        }
        if let Some(n) = opt_u32(env, "CHUNK_OVERLAP")? {
            cfg.chunking.overlap = n as usize;
        }
        if let Some(s) = opt_var(env, "CHUNK_STRATEGY") {
            cfg.chunking.strategy = ChunkStrategy::parse(&s)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// [`RagConfig::from_env`] over the process environment.
    pub fn from_process_env() -> Result<Self, RagError> {
        Self::from_env(&ProcessEnv)
    }

    /// Validates config values.
    pub fn validate(&self) -> Result<(), RagError> {
        let url = self.qdrant_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RagError::Config(
                "QDRANT_URL must start with http:// or https://".into(),
            ));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::Config("collection is empty".into()));
        }
        if self.upsert_batch == 0 {
            return Err(RagError::Config("upsert_batch must be > 0".into()));
        }
        if self.embedding_dim == Some(0) {
            return Err(RagError::Config("EMBEDDING_DIM must be > 0".into()));
        }
        validate(self.chunking.size, self.chunking.overlap)
    }
}

/// Accepts `1/0`, `true/false`, `yes/no`, `on/off`.
pub fn parse_bool(var: &str, value: &str) -> Result<bool, RagError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RagError::Config(format!("{var}: expected a boolean, got {value:?}"))),
    }
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
    fn defaults_follow_the_reference_deployment() {
        let cfg = RagConfig::from_env(&env(&[("QDRANT_URL", "http://localhost:6334")])).unwrap();
        assert_eq!(cfg.collection, "langchain_vector");
        assert_eq!(cfg.chunking, ChunkingConfig::default());
        assert_eq!(cfg.embedding_dim, None);
    }

    #[test]
    fn missing_url_fails_fast() {
        let err = RagConfig::from_env(&env(&[])).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("QDRANT_URL"));
    }

    #[test]
    fn overlap_not_below_size_is_rejected() {
        let e = env(&[
            ("QDRANT_URL", "http://localhost:6334"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]);
        assert!(matches!(
            RagConfig::from_env(&e),
            Err(RagError::InvalidChunking { .. })
        ));
    }

    #[test]
    fn booleans_parse() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
