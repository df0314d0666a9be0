//! Core data models used by the library.

use serde::{Deserialize, Serialize};

/// Vector record stored in the index: an embedded chunk.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RagRecord {
    /// Point id (UUID string, deterministic per chunk).
    pub id: String,
    pub text: String,
    pub source: String,
    /// Chunk index within the source document.
    pub index: usize,
    /// Character offset within the source document.
    pub position: usize,
    pub embedding: Vec<f32>,
}

/// A single retrieval hit. Higher `score` means more similar (cosine).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RagHit {
    pub score: f32,
    pub text: String,
    pub source: Option<String>,
    /// Remaining payload fields (index, position, ...).
    pub metadata: serde_json::Value,
}
