//! In-memory vector index for tests and offline runs.

use std::sync::RwLock;

use crate::embed::RagFuture;
use crate::errors::RagError;
use crate::index::VectorIndex;
use crate::record::{RagHit, RagRecord};

#[derive(Debug, Default)]
struct Table {
    dim: Option<usize>,
    rows: Vec<RagRecord>,
}

/// Brute-force cosine index.
///
/// Behaves like a SQL table: inserts append, so writing the same record
/// twice stores it twice. The collection exists once
/// [`VectorIndex::ensure_collection`] was called.
#[derive(Debug)]
pub struct MemoryIndex {
    name: String,
    table: RwLock<Table>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: RwLock::new(Table::default()),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Table) -> T) -> Result<T, RagError> {
        let guard = self
            .table
            .read()
            .map_err(|_| RagError::Qdrant("memory index lock poisoned".into()))?;
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Table) -> Result<T, RagError>) -> Result<T, RagError> {
        let mut guard = self
            .table
            .write()
            .map_err(|_| RagError::Qdrant("memory index lock poisoned".into()))?;
        f(&mut guard)
    }
}

impl VectorIndex for MemoryIndex {
    fn collection(&self) -> &str {
        &self.name
    }

    fn collection_exists(&self) -> RagFuture<'_, bool> {
        Box::pin(async move { self.read(|t| t.dim.is_some()) })
    }

    fn ensure_collection(&self, dim: usize) -> RagFuture<'_, ()> {
        Box::pin(async move {
            self.write(|t| match t.dim {
                Some(have) if have != dim => Err(RagError::VectorSizeMismatch { got: dim, want: have }),
                _ => {
                    t.dim = Some(dim);
                    Ok(())
                }
            })
        })
    }

    fn upsert(&self, batch: Vec<RagRecord>) -> RagFuture<'_, usize> {
        Box::pin(async move {
            self.write(|t| {
                let dim = t
                    .dim
                    .ok_or_else(|| RagError::Qdrant(format!("collection '{}' does not exist", self.name)))?;
                if let Some(bad) = batch.iter().find(|r| r.embedding.len() != dim) {
                    return Err(RagError::VectorSizeMismatch {
                        got: bad.embedding.len(),
                        want: dim,
                    });
                }
                let n = batch.len();
                t.rows.extend(batch);
                Ok(n)
            })
        })
    }

    fn count(&self) -> RagFuture<'_, u64> {
        Box::pin(async move { self.read(|t| t.rows.len() as u64) })
    }

    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> RagFuture<'a, Vec<RagHit>> {
        Box::pin(async move {
            self.read(|t| {
                let mut scored: Vec<(f32, &RagRecord)> = t
                    .rows
                    .iter()
                    .map(|r| (cosine(vector, &r.embedding), r))
                    .filter(|(s, _)| score_threshold.is_none_or(|min| *s >= min))
                    .collect();
                scored.sort_by(|a, b| b.0.total_cmp(&a.0));
                scored
                    .into_iter()
                    .take(k)
                    .map(|(score, r)| RagHit {
                        score,
                        text: r.text.clone(),
                        source: Some(r.source.clone()),
                        metadata: serde_json::json!({
                            "index": r.index,
                            "position": r.position,
                        }),
                    })
                    .collect()
            })
        })
    }
}

/// Cosine similarity in `[-1, 1]`; 0 for zero-length vectors or mismatched sizes.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, v: Vec<f32>) -> RagRecord {
        RagRecord {
            id: id.into(),
            text: format!("text {id}"),
            source: "mem".into(),
            index: 0,
            position: 0,
            embedding: v,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-6);
        assert!(cosine(&a, &[0.0, 1.0, 0.0]).abs() < 1e-6);
        assert_eq!(cosine(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[tokio::test]
    async fn search_orders_and_thresholds() {
        let idx = MemoryIndex::new("t");
        assert!(!idx.collection_exists().await.unwrap());
        idx.ensure_collection(2).await.unwrap();
        idx.upsert(vec![
            rec("a", vec![1.0, 0.0]),
            rec("b", vec![0.6, 0.8]),
            rec("c", vec![0.0, 1.0]),
        ])
        .await
        .unwrap();

        let hits = idx.search(&[1.0, 0.0], 3, Some(0.5)).await.unwrap();
        let texts: Vec<_> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["text a", "text b"]);
        assert!(hits.iter().all(|h| h.score >= 0.5));

        let hits = idx.search(&[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn inserts_append_and_dim_is_enforced() {
        let idx = MemoryIndex::new("t");
        assert!(idx.upsert(vec![rec("a", vec![1.0])]).await.is_err());
        idx.ensure_collection(1).await.unwrap();
        idx.upsert(vec![rec("a", vec![1.0])]).await.unwrap();
        idx.upsert(vec![rec("a", vec![1.0])]).await.unwrap();
        assert_eq!(idx.count().await.unwrap(), 2);
        assert!(idx.upsert(vec![rec("x", vec![1.0, 2.0])]).await.is_err());
        assert!(idx.ensure_collection(3).await.is_err());
    }
}
