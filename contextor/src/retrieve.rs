//! Retrieval step: standalone question → thresholded context hits.

use rag_store::{RagHit, RagStore, SearchParams};
use tracing::{info, instrument};

use crate::api_types::UsedChunk;
use crate::error::ContextorError;

/// Fixed-k, fixed-threshold retriever over a [`RagStore`].
#[derive(Clone)]
pub struct Retriever {
    store: RagStore,
    params: SearchParams,
}

impl Retriever {
    pub fn new(store: RagStore, params: SearchParams) -> Self {
        Self { store, params }
    }

    pub fn params(&self) -> SearchParams {
        self.params
    }

    /// At most `top_k` hits, each scoring at least the threshold, best first.
    /// An empty result is not an error.
    ///
    /// # Errors
    /// Embedding or vector index failures.
    #[instrument(skip_all, fields(k = self.params.top_k, threshold = self.params.score_threshold))]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RagHit>, ContextorError> {
        let hits = self.store.search(question, self.params).await?;
        info!(hits = hits.len(), "context retrieved");
        Ok(hits)
    }
}

/// Converts hits for callers (API responses, CLI listing).
pub fn used_chunks(hits: &[RagHit]) -> Vec<UsedChunk> {
    hits.iter()
        .map(|h| UsedChunk {
            score: h.score,
            source: h.source.clone(),
            text: h.text.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use rag_store::{
        ChunkStrategy, ChunkingConfig, Document, HashingEmbedder, IngestOptions, MemoryIndex,
    };

    async fn store() -> RagStore {
        let store = RagStore::new(
            Arc::new(MemoryIndex::new("t")),
            Arc::new(HashingEmbedder::new(128)),
            ChunkingConfig {
                strategy: ChunkStrategy::Recursive,
                size: 40,
                overlap: 0,
            },
            IngestOptions::default(),
        );
        let doc = Document::new(
            "History.txt",
            "sandy soil drains quickly\n\nclay soil holds water\n\nloam soil mixes sand and clay\n\npeat soil is organic\n\nthe king was crowned",
        );
        store.ingest_document(&doc).await.unwrap();
        store
    }

    #[tokio::test]
    async fn hits_respect_k_and_threshold() {
        let r = Retriever::new(
            store().await,
            SearchParams {
                top_k: 2,
                score_threshold: 0.2,
            },
        );
        let hits = r.retrieve("which soil holds water").await.unwrap();
        assert!(!hits.is_empty() && hits.len() <= 2);
        assert!(hits.iter().all(|h| h.score >= 0.2));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(hits[0].text, "clay soil holds water");
    }

    #[tokio::test]
    async fn nothing_above_threshold_is_empty() {
        let r = Retriever::new(store().await, SearchParams::default());
        let hits = r.retrieve("quantum chromodynamics").await.unwrap();
        assert!(hits.is_empty());
        assert!(used_chunks(&hits).is_empty());
    }
}
