//! Document chunking strategies.
//!
//! Two strategies are provided:
//! - [`FixedSizeChunker`]: sliding character window, exact overlap
//! - [`RecursiveChunker`]: separator-aware packing (paragraphs, lines, words)
//!
//! Sizes and overlaps are counted in characters (Unicode scalar values),
//! never bytes, so multi-byte text is never split inside a code point.

use serde::{Deserialize, Serialize};
use services::uuid::content_fingerprint;

use crate::document::Document;
use crate::errors::RagError;

mod fixed;
mod recursive;

pub use fixed::{FixedSizeChunker, FixedWindows};
pub use recursive::RecursiveChunker;

/// A chunk of a document with its position metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// Stable identifier derived from source, position and content.
    pub id: String,
    /// The text content of this chunk.
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    /// Source document identifier (usually its path).
    pub source: String,
    /// Index of this chunk within the document (0-based).
    pub index: usize,
    /// Character offset of the chunk start within the document.
    pub position: usize,
    /// Total number of chunks produced from the document.
    pub total_chunks: usize,
}

/// Splitting strategy for documents.
pub trait Chunker: Send + Sync {
    /// Short strategy name for logs.
    fn name(&self) -> &str;

    /// Splits `doc` into ordered chunks (empty documents yield none).
    fn chunk(&self, doc: &Document) -> Vec<Chunk>;
}

/// Which chunker ingestion uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkStrategy {
    #[default]
    Recursive,
    Fixed,
}

impl ChunkStrategy {
    pub fn parse(s: &str) -> Result<Self, RagError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "recursive" => Ok(Self::Recursive),
            "fixed" => Ok(Self::Fixed),
            other => Err(RagError::Config(format!("unknown chunk strategy: {other}"))),
        }
    }

    /// Builds the chunker, validating parameters.
    pub fn build(self, size: usize, overlap: usize) -> Result<Box<dyn Chunker>, RagError> {
        Ok(match self {
            Self::Recursive => Box::new(RecursiveChunker::new(size, overlap)?),
            Self::Fixed => Box::new(FixedSizeChunker::new(size, overlap)?),
        })
    }
}

/// Fails unless `0 < size` and `overlap < size`.
pub(crate) fn validate(size: usize, overlap: usize) -> Result<(), RagError> {
    if size == 0 || overlap >= size {
        return Err(RagError::InvalidChunking { size, overlap });
    }
    Ok(())
}

/// Fixed-size chunking of a raw string as a lazy, single-pass iterator.
///
/// # Errors
/// [`RagError::InvalidChunking`] if `overlap >= size` or `size == 0`.
pub fn chunk(document: &str, size: usize, overlap: usize) -> Result<FixedWindows<'_>, RagError> {
    validate(size, overlap)?;
    Ok(FixedWindows::new(document, size, overlap))
}

/// Attaches ids and metadata to `(char_position, text)` pieces.
pub(crate) fn assemble(source: &str, pieces: Vec<(usize, String)>) -> Vec<Chunk> {
    let total = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(index, (position, text))| Chunk {
            id: content_fingerprint(&format!("{source}#{index}@{position}:{text}")),
            text,
            metadata: ChunkMetadata {
                source: source.to_string(),
                index,
                position,
                total_chunks: total,
            },
        })
        .collect()
}
