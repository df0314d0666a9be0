//! Idempotent ingestion: chunks → embeddings → vector index.
//!
//! The collection is checked first. A collection holding at least as many
//! records as there are chunks is left untouched, so restarting never
//! duplicates the corpus. A shorter one (an earlier run failed mid-way) is
//! completed from the first missing record; batches are written in order.

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::chunk::Chunk;
use crate::embed::EmbeddingsProvider;
use crate::embed_pool::embed_chunks;
use crate::errors::RagError;
use crate::index::VectorIndex;

/// Tuning knobs for [`ingest_if_absent`].
#[derive(Clone, Copy, Debug)]
pub struct IngestOptions {
    /// Records per upsert request.
    pub batch: usize,
    /// Parallel embedding requests.
    pub concurrency: usize,
    pub expected_dim: Option<usize>,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            batch: 128,
            concurrency: 4,
            expected_dim: None,
            progress: false,
        }
    }
}

/// What [`ingest_if_absent`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Collection already complete; nothing written.
    Skipped { existing: u64 },
    /// Records written by this run (all of them, or the missing tail).
    Ingested { records: usize },
}

/// Embeds and stores `chunks` unless the collection already holds them.
///
/// # Errors
/// Embedding failures, dimension mismatches and index errors. A failure
/// mid-way leaves the collection partially filled; the next call resumes it.
pub async fn ingest_if_absent(
    index: &dyn VectorIndex,
    embedder: &dyn EmbeddingsProvider,
    chunks: &[Chunk],
    opts: IngestOptions,
) -> Result<IngestOutcome, RagError> {
    let exists = index.collection_exists().await?;
    let existing = if exists { index.count().await? } else { 0 };
    if exists && existing >= chunks.len() as u64 {
        info!(collection = %index.collection(), existing, "collection present, skipping ingestion");
        return Ok(IngestOutcome::Skipped { existing });
    }
    if chunks.is_empty() {
        warn!(collection = %index.collection(), "no chunks to ingest");
        return Ok(IngestOutcome::Ingested { records: 0 });
    }

    // existing < chunks.len() here
    let done = usize::try_from(existing).unwrap_or(0);
    if done > 0 {
        warn!(
            collection = %index.collection(),
            existing,
            total = chunks.len(),
            "collection incomplete, resuming ingestion"
        );
    }

    let records = embed_chunks(&chunks[done..], embedder, opts.expected_dim, opts.concurrency).await?;
    let dim = records.first().map_or(0, |r| r.embedding.len());
    index.ensure_collection(dim).await?;

    let batch = opts.batch.max(1);
    let pb = progress_bar(records.len().div_ceil(batch) as u64, opts.progress);

    let mut written = 0usize;
    let mut rest = records;
    while !rest.is_empty() {
        let tail = rest.split_off(batch.min(rest.len()));
        written += index.upsert(rest).await?;
        rest = tail;
        pb.inc(1);
        debug!(written, "batch upserted");
    }

    pb.finish_and_clear();
    info!(collection = %index.collection(), records = written, dim, "ingestion complete");
    Ok(IngestOutcome::Ingested { records: written })
}

fn progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    match ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} batches",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("##-")),
        Err(e) => debug!(error = %e, "progress template rejected, using default style"),
    }
    pb
}
