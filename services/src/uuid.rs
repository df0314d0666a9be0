//! Deterministic identifiers for vector points and chat chunks.

use uuid::Uuid;

/// Deterministic UUIDv5 from an arbitrary string id.
///
/// The same input always maps to the same UUID, so re-ingesting an unchanged
/// chunk produces the same point id in the vector store.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

/// Short hex fingerprint of `text` (first 16 hex chars of its UUIDv5).
pub fn content_fingerprint(text: &str) -> String {
    let full = stable_uuid(text).simple().to_string();
    full[..16].to_string()
}
