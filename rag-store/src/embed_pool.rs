//! Embedding executor with concurrency and dimension checks.

use futures::stream::{self, StreamExt, TryStreamExt};
use services::uuid::stable_uuid;
use tracing::{debug, info};

use crate::chunk::Chunk;
use crate::embed::{EmbeddingsProvider, ensure_dim};
use crate::errors::RagError;
use crate::record::RagRecord;

/// Embeds every chunk, at most `concurrency` requests in flight.
///
/// Output order matches input order. All vectors share one dimension: the
/// first vector fixes it unless `expected_dim` is set.
///
/// # Errors
/// The first provider error, or [`RagError::VectorSizeMismatch`].
pub async fn embed_chunks(
    chunks: &[Chunk],
    provider: &dyn EmbeddingsProvider,
    expected_dim: Option<usize>,
    concurrency: usize,
) -> Result<Vec<RagRecord>, RagError> {
    info!(total = chunks.len(), concurrency, "embedding chunks");

    let mut vectors: Vec<(usize, Vec<f32>)> = stream::iter(chunks.iter().enumerate())
        .map(|(i, c)| async move { provider.embed(&c.text).await.map(|v| (i, v)) })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;
    vectors.sort_by_key(|(i, _)| *i);

    let want = expected_dim.or_else(|| vectors.first().map(|(_, v)| v.len()));
    let mut records = Vec::with_capacity(chunks.len());
    for (chunk, (_, embedding)) in chunks.iter().zip(vectors) {
        ensure_dim(&embedding, want)?;
        records.push(to_record(chunk, embedding));
    }

    debug!(records = records.len(), dim = ?want, "chunks embedded");
    Ok(records)
}

fn to_record(chunk: &Chunk, embedding: Vec<f32>) -> RagRecord {
    let meta = &chunk.metadata;
    RagRecord {
        id: stable_uuid(&format!("{}#{}:{}", meta.source, meta.index, chunk.id)).to_string(),
        text: chunk.text.clone(),
        source: meta.source.clone(),
        index: meta.index,
        position: meta.position,
        embedding,
    }
}
