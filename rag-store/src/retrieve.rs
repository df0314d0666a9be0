//! Retrieval helpers: text query → thresholded, ranked hits.

use tracing::{debug, instrument};

use crate::embed::EmbeddingsProvider;
use crate::errors::RagError;
use crate::index::VectorIndex;
use crate::record::RagHit;

/// Retrieval parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchParams {
    pub top_k: usize,
    /// Minimum similarity, inclusive.
    pub score_threshold: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 3,
            score_threshold: 0.5,
        }
    }
}

/// Embeds `query` and returns at most `top_k` hits with
/// `score >= score_threshold`, best first.
///
/// The index is asked to apply the threshold too; the result is filtered
/// again here so the guarantee does not depend on the backend.
///
/// # Errors
/// [`RagError::EmptyText`] for a blank query, embedding or index failures.
#[instrument(skip_all, fields(collection = %index.collection(), k = params.top_k))]
pub async fn search_text(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingsProvider,
    query: &str,
    params: SearchParams,
) -> Result<Vec<RagHit>, RagError> {
    let vector = embedder.embed(query).await?;
    let raw = index
        .search(&vector, params.top_k, Some(params.score_threshold))
        .await?;
    let hits = rank(raw, params);
    debug!(hits = hits.len(), "retrieval done");
    Ok(hits)
}

/// Drops hits below the threshold, sorts by descending score, keeps `top_k`.
pub fn rank(mut hits: Vec<RagHit>, params: SearchParams) -> Vec<RagHit> {
    hits.retain(|h| h.score >= params.score_threshold);
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(params.top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::hashing::HashingEmbedder;
    use crate::embed_pool::embed_chunks;
    use crate::chunk::ChunkStrategy;
    use crate::document::Document;
    use crate::memory::MemoryIndex;

    fn hit(score: f32) -> RagHit {
        RagHit {
            score,
            text: format!("{score}"),
            source: None,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn rank_filters_sorts_and_truncates() {
        let params = SearchParams::default();
        let out = rank(vec![hit(0.2), hit(0.9), hit(0.5), hit(0.7), hit(0.6)], params);
        let scores: Vec<f32> = out.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.9, 0.7, 0.6]);
    }

    #[test]
    fn empty_result_is_valid() {
        assert!(rank(vec![hit(0.1)], SearchParams::default()).is_empty());
    }

    #[tokio::test]
    async fn finds_the_matching_paragraph() {
        let doc = Document::new(
            "History.txt",
            "clay soil holds water\n\nsandy soil drains quickly\n\nthe river floods every spring",
        );
        let chunks = ChunkStrategy::Recursive.build(30, 0).unwrap().chunk(&doc);
        let emb = HashingEmbedder::new(128);
        let index = MemoryIndex::new("t");
        index.ensure_collection(128).await.unwrap();
        index
            .upsert(embed_chunks(&chunks, &emb, None, 2).await.unwrap())
            .await
            .unwrap();

        let hits = search_text(&index, &emb, "clay soil holds water", SearchParams::default())
            .await
            .unwrap();
        assert!(!hits.is_empty() && hits.len() <= 3);
        assert_eq!(hits[0].text, "clay soil holds water");
        assert!(hits.iter().all(|h| h.score >= 0.5));

        let err = search_text(&index, &emb, "   ", SearchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmptyText));
    }
}
