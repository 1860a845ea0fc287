//! Qdrant adapter
//!
//! Maps the [`VectorDatabase`](super::VectorDatabase) port onto the Qdrant
//! gRPC client. Every outbound call acquires the shared database rate
//! limiter first, so throttling is uniform across operations.

use super::{ChunkPayload, ChunkPoint, CollectionInfo, Distance, VectorDatabase};
use crate::error::{Error, Result};
use crate::throttle::RateLimiter;
use async_trait::async_trait;
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, DeletePointsBuilder, Distance as QdrantDistance,
    Filter, GetPointsBuilder, PointStruct, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

pub struct QdrantDb {
    client: Qdrant,
    limiter: RateLimiter,
}

impl QdrantDb {
    /// Connect to a Qdrant instance at the given gRPC URL
    pub fn connect(url: &str, limiter: RateLimiter) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .skip_compatibility_check()
            .build()
            .map_err(|e| Error::Database(format!("failed to connect to qdrant: {}", e)))?;
        debug!(url = %url, "connected to qdrant");
        Ok(Self { client, limiter })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        self.limiter.acquire().await;
        Ok(self.client.collection_exists(name).await?)
    }
}

impl From<Distance> for QdrantDistance {
    fn from(distance: Distance) -> Self {
        match distance {
            Distance::Cosine => QdrantDistance::Cosine,
            Distance::Euclid => QdrantDistance::Euclid,
            Distance::Dot => QdrantDistance::Dot,
        }
    }
}

fn to_qdrant_payload(payload: &ChunkPayload) -> HashMap<String, Value> {
    let mut map = HashMap::new();
    map.insert("chunk_text".to_string(), Value::from(payload.chunk_text.clone()));
    map.insert("source_file".to_string(), Value::from(payload.source_file.clone()));
    map.insert("ordinal".to_string(), Value::from(payload.ordinal));
    map.insert("namespace".to_string(), Value::from(payload.namespace.clone()));
    map.insert("content_hash".to_string(), Value::from(payload.content_hash.clone()));
    map.insert("updated_at".to_string(), Value::from(payload.updated_at.clone()));
    map
}

#[async_trait]
impl VectorDatabase for QdrantDb {
    async fn create_collection(
        &self,
        name: &str,
        distance: Distance,
        vector_size: usize,
    ) -> Result<()> {
        if self.exists(name).await? {
            info!(collection = %name, "collection already exists");
            return Ok(());
        }

        self.limiter.acquire().await;
        self.client
            .create_collection(
                CreateCollectionBuilder::new(name).vectors_config(VectorParamsBuilder::new(
                    vector_size as u64,
                    QdrantDistance::from(distance),
                )),
            )
            .await?;
        info!(collection = %name, %distance, vector_size, "created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        self.limiter.acquire().await;
        self.client.delete_collection(name).await?;
        info!(collection = %name, "deleted collection");
        Ok(())
    }

    async fn clear_collection(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        self.limiter.acquire().await;
        // An empty filter matches every point.
        self.client
            .delete_points(
                DeletePointsBuilder::new(name)
                    .points(Filter::default())
                    .wait(true),
            )
            .await?;
        info!(collection = %name, "cleared collection");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        let response = self.client.list_collections().await?;
        Ok(response
            .collections
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        if !self.exists(name).await? {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        self.limiter.acquire().await;
        let response = self.client.collection_info(name).await?;
        let info = response
            .result
            .ok_or_else(|| Error::Database(format!("no info returned for '{}'", name)))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: info.points_count.unwrap_or(0),
            status: format!("{:?}", info.status()),
        })
    }

    async fn point_exists(&self, collection: &str, id: Uuid) -> Result<bool> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, vec![id.to_string().into()])
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await?;
        Ok(!response.result.is_empty())
    }

    async fn fetch_content_hash(&self, collection: &str, id: Uuid) -> Result<Option<String>> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(collection, vec![id.to_string().into()])
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await?;

        let Some(point) = response.result.into_iter().next() else {
            return Ok(None);
        };
        let hash = point.payload.get("content_hash").and_then(|value| {
            match &value.kind {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            }
        });
        Ok(hash)
    }

    async fn upsert_chunk(&self, collection: &str, point: ChunkPoint) -> Result<()> {
        self.limiter.acquire().await;
        let payload = to_qdrant_payload(&point.payload);
        let point_struct = PointStruct::new(point.id.to_string(), point.vector, payload);
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point_struct]).wait(true))
            .await?;
        debug!(collection = %collection, id = %point.id, "upserted chunk");
        Ok(())
    }
}
