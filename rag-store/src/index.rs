//! Vector index seam.
//!
//! Score convention for every implementation: cosine similarity, higher is
//! more similar.

use crate::embed::RagFuture;
use crate::record::{RagHit, RagRecord};

/// Storage of `(vector, text, metadata)` records with similarity search.
///
/// Upserts are not required to be idempotent; ingestion resumes from
/// [`VectorIndex::count`] instead of rewriting records.
pub trait VectorIndex: Send + Sync {
    /// Name of the backing collection/table.
    fn collection(&self) -> &str;

    fn collection_exists(&self) -> RagFuture<'_, bool>;

    /// Creates the collection for `dim`-sized vectors if missing.
    fn ensure_collection(&self, dim: usize) -> RagFuture<'_, ()>;

    /// Stores a batch; returns the number of records written.
    fn upsert(&self, batch: Vec<RagRecord>) -> RagFuture<'_, usize>;

    /// Number of stored records (0 when the collection is missing).
    fn count(&self) -> RagFuture<'_, u64>;

    /// Up to `k` hits, best first, each with `score >= score_threshold` when given.
    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> RagFuture<'a, Vec<RagHit>>;
}
