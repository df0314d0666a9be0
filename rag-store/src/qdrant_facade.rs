//! Thin adapter around `qdrant-client` to isolate API usage.
//!
//! This facade concentrates all Qdrant interactions behind [`VectorIndex`],
//! hiding away the verbose builder pattern and keeping the rest of the
//! application decoupled from `qdrant-client`.

use qdrant_client::qdrant::{
    CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct, SearchParamsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::{debug, info};

use crate::config::RagConfig;
use crate::embed::RagFuture;
use crate::errors::RagError;
use crate::index::VectorIndex;
use crate::record::{RagHit, RagRecord};

/// Qdrant-backed [`VectorIndex`] addressed by a connection URL.
///
/// This struct encapsulates:
/// - The underlying Qdrant client.
/// - The target collection name.
/// - The search mode (cosine collections only, so scores grow with similarity).
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    exact: bool,
}

impl QdrantIndex {
    /// Creates a new index client from the given configuration.
    ///
    /// No request is sent; the first call reveals connectivity problems.
    ///
    /// # Errors
    /// `RagError::Config` for invalid settings, `RagError::Qdrant` if the
    /// client cannot be built.
    pub fn new(cfg: &RagConfig) -> Result<Self, RagError> {
        cfg.validate()?;

        let mut builder = Qdrant::from_url(&cfg.qdrant_url);
        if let Some(key) = &cfg.qdrant_api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder.build().map_err(qerr("build client"))?;

        Ok(Self {
            client,
            collection: cfg.collection.clone(),
            exact: cfg.exact_search,
        })
    }
}

impl VectorIndex for QdrantIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_exists(&self) -> RagFuture<'_, bool> {
        Box::pin(async move {
            self.client
                .collection_exists(&self.collection)
                .await
                .map_err(qerr("collection_exists"))
        })
    }

    fn ensure_collection(&self, dim: usize) -> RagFuture<'_, ()> {
        Box::pin(async move {
            if self.collection_exists().await? {
                debug!(collection = %self.collection, "collection already exists");
                return Ok(());
            }

            self.client
                .create_collection(collection_request(&self.collection, dim))
                .await
                .map_err(qerr("create_collection"))?;

            info!(collection = %self.collection, dim, "collection created");
            Ok(())
        })
    }

    fn upsert(&self, batch: Vec<RagRecord>) -> RagFuture<'_, usize> {
        Box::pin(async move {
            if batch.is_empty() {
                return Ok(0);
            }
            let n = batch.len();
            let points = batch
                .into_iter()
                .map(to_point)
                .collect::<Result<Vec<_>, _>>()?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
                .await
                .map_err(qerr("upsert_points"))?;

            debug!(collection = %self.collection, points = n, "upsert acknowledged");
            Ok(n)
        })
    }

    fn count(&self) -> RagFuture<'_, u64> {
        Box::pin(async move {
            if !self.collection_exists().await? {
                return Ok(0);
            }
            let res = self
                .client
                .count(CountPointsBuilder::new(&self.collection).exact(true))
                .await
                .map_err(qerr("count"))?;
            Ok(res.result.map(|r| r.count).unwrap_or(0))
        })
    }

    fn search<'a>(
        &'a self,
        vector: &'a [f32],
        k: usize,
        score_threshold: Option<f32>,
    ) -> RagFuture<'a, Vec<RagHit>> {
        Box::pin(async move {
            let mut builder = SearchPointsBuilder::new(&self.collection, vector.to_vec(), k as u64)
                .with_payload(true);
            if let Some(t) = score_threshold {
                builder = builder.score_threshold(t);
            }
            if self.exact {
                builder = builder.params(SearchParamsBuilder::default().exact(true));
            }

            let res = self
                .client
                .search_points(builder)
                .await
                .map_err(qerr("search_points"))?;

            let hits: Vec<RagHit> = res
                .result
                .into_iter()
                .map(|p| {
                    let mut meta = serde_json::Map::new();
                    for (k, v) in p.payload {
                        meta.insert(k, v.into_json());
                    }
                    let text = meta
                        .remove("text")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();
                    let source = meta
                        .remove("source")
                        .and_then(|v| v.as_str().map(str::to_string));
                    RagHit {
                        score: p.score,
                        text,
                        source,
                        metadata: serde_json::Value::Object(meta),
                    }
                })
                .collect();

            debug!(collection = %self.collection, hits = hits.len(), "search completed");
            Ok(hits)
        })
    }
}

/// Cosine collection of `dim`-sized vectors.
fn collection_request(collection: &str, dim: usize) -> CreateCollectionBuilder {
    CreateCollectionBuilder::new(collection)
        .vectors_config(VectorParamsBuilder::new(dim as u64, Distance::Cosine))
}

fn to_point(r: RagRecord) -> Result<PointStruct, RagError> {
    let payload = Payload::try_from(serde_json::json!({
        "text": r.text,
        "source": r.source,
        "index": r.index,
        "position": r.position,
    }))
    .map_err(qerr("payload"))?;
    Ok(PointStruct::new(r.id, r.embedding, payload))
}

fn qerr<E: std::fmt::Display>(op: &'static str) -> impl Fn(E) -> RagError {
    move |e| RagError::Qdrant(format!("{op}: {e}"))
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::{CreateCollection, VectorParams, vectors_config::Config};

    use super::*;

    #[test]
    fn collections_are_created_with_cosine_distance() {
        let req = CreateCollection::from(collection_request("langchain_vector", 384));
        assert_eq!(req.collection_name, "langchain_vector");
        let Some(Config::Params(VectorParams { size, distance, .. })) =
            req.vectors_config.and_then(|v| v.config)
        else {
            panic!("expected single vector params");
        };
        assert_eq!(size, 384);
        assert_eq!(distance, Distance::Cosine as i32);
    }
}
