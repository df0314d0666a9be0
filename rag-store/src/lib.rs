//! Document chunking, embeddings and vector storage for conversational RAG.
//!
//! This crate provides a clean API to:
//! - Load a text corpus and split it into chunks
//! - Ingest chunks into a vector index once (restarts never duplicate them)
//! - Retrieve top‑K context above a similarity threshold for a textual query
//!
//! The index ([`VectorIndex`]) and the embedder ([`EmbeddingsProvider`]) are
//! trait objects, so Qdrant and a hosted embedding model can be swapped for
//! [`MemoryIndex`] and [`HashingEmbedder`] in tests.

pub mod chunk;
mod config;
pub mod document;
pub mod embed;
mod embed_pool;
mod errors;
mod index;
mod ingest;
mod memory;
mod qdrant_facade;
mod record;
mod retrieve;

use std::sync::Arc;

pub use chunk::{Chunk, ChunkMetadata, ChunkStrategy, Chunker, FixedSizeChunker, RecursiveChunker};
pub use config::{ChunkingConfig, DEFAULT_COLLECTION, RagConfig, parse_bool};
pub use document::{Document, load_text_document};
pub use embed::hashing::HashingEmbedder;
pub use embed::llm::LlmEmbedder;
pub use embed::{EmbeddingsProvider, RagFuture};
pub use embed_pool::embed_chunks;
pub use errors::RagError;
pub use index::VectorIndex;
pub use ingest::{IngestOptions, IngestOutcome, ingest_if_absent};
pub use memory::{MemoryIndex, cosine};
pub use qdrant_facade::QdrantIndex;
pub use record::{RagHit, RagRecord};
pub use retrieve::{SearchParams, rank, search_text};

use tracing::{debug, trace};

/// High-level facade that wires an index, an embedder and the chunking setup.
///
/// This is the single entry point recommended for application code. Cloning
/// is cheap; clones share the index and the embedder.
#[derive(Clone)]
pub struct RagStore {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingsProvider>,
    chunking: ChunkingConfig,
    ingest: IngestOptions,
}

impl RagStore {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingsProvider>,
        chunking: ChunkingConfig,
        ingest: IngestOptions,
    ) -> Self {
        Self {
            index,
            embedder,
            chunking,
            ingest,
        }
    }

    /// Qdrant-backed store described by `cfg`.
    ///
    /// # Errors
    /// `RagError::Config` if the configuration is invalid.
    pub fn qdrant(cfg: &RagConfig, embedder: Arc<dyn EmbeddingsProvider>) -> Result<Self, RagError> {
        trace!(collection = %cfg.collection, "RagStore::qdrant");
        let index = Arc::new(QdrantIndex::new(cfg)?);
        Ok(Self::new(index, embedder, cfg.chunking, ingest_options(cfg)))
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingsProvider> {
        &self.embedder
    }

    /// Splits `doc` with the configured strategy.
    ///
    /// # Errors
    /// [`RagError::InvalidChunking`] for inconsistent size/overlap.
    pub fn chunk(&self, doc: &Document) -> Result<Vec<Chunk>, RagError> {
        let chunker = self.chunking.strategy.build(self.chunking.size, self.chunking.overlap)?;
        let chunks = chunker.chunk(doc);
        debug!(source = %doc.source, strategy = chunker.name(), chunks = chunks.len(), "document chunked");
        Ok(chunks)
    }

    /// Chunks `doc` and ingests whatever the collection is missing.
    ///
    /// # Errors
    /// Chunking, embedding or index errors.
    pub async fn ingest_document(&self, doc: &Document) -> Result<IngestOutcome, RagError> {
        let chunks = self.chunk(doc)?;
        ingest_if_absent(self.index.as_ref(), self.embedder.as_ref(), &chunks, self.ingest).await
    }

    /// Thresholded similarity search for `query`.
    ///
    /// # Errors
    /// Embedding or index errors.
    pub async fn search(&self, query: &str, params: SearchParams) -> Result<Vec<RagHit>, RagError> {
        search_text(self.index.as_ref(), self.embedder.as_ref(), query, params).await
    }
}

fn ingest_options(cfg: &RagConfig) -> IngestOptions {
    IngestOptions {
        batch: cfg.upsert_batch,
        concurrency: cfg.embedding_concurrency,
        expected_dim: cfg.embedding_dim,
        progress: true,
    }
}
