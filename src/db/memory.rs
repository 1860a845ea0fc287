//! In-memory adapter
//!
//! Backs the port with plain maps behind an async lock. Used by the
//! integration tests and available from the CLI for dry runs against a
//! throwaway store. Mirrors the qdrant adapter's semantics, including
//! rate limiter acquisition, so pipeline behavior is identical.

use super::{ChunkPayload, ChunkPoint, CollectionInfo, Distance, VectorDatabase};
use crate::error::{Error, Result};
use crate::throttle::RateLimiter;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

#[derive(Debug)]
struct MemoryCollection {
    #[allow(dead_code)]
    distance: Distance,
    #[allow(dead_code)]
    vector_size: usize,
    points: HashMap<Uuid, StoredPoint>,
}

pub struct MemoryDb {
    limiter: RateLimiter,
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryDb {
    pub fn new(limiter: RateLimiter) -> Self {
        Self {
            limiter,
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a point directly, bypassing the port. Lets tests stage
    /// pre-existing state such as a hash-colliding occupant.
    pub async fn seed_point(&self, collection: &str, point: ChunkPoint) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        entry.points.insert(
            point.id,
            StoredPoint {
                vector: point.vector,
                payload: point.payload,
            },
        );
        Ok(())
    }

    /// Read a stored point back for assertions
    pub async fn get_point(&self, collection: &str, id: Uuid) -> Option<StoredPoint> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|c| c.points.get(&id))
            .cloned()
    }

    pub async fn point_count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, |c| c.points.len())
    }
}

#[async_trait]
impl VectorDatabase for MemoryDb {
    async fn create_collection(
        &self,
        name: &str,
        distance: Distance,
        vector_size: usize,
    ) -> Result<()> {
        self.limiter.acquire().await;
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_insert(MemoryCollection {
            distance,
            vector_size,
            points: HashMap::new(),
        });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.limiter.acquire().await;
        let mut collections = self.collections.write().await;
        if collections.remove(name).is_none() {
            return Err(Error::CollectionNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn clear_collection(&self, name: &str) -> Result<()> {
        self.limiter.acquire().await;
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
        entry.points.clear();
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.limiter.acquire().await;
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        self.limiter.acquire().await;
        let collections = self.collections.read().await;
        let entry = collections
            .get(name)
            .ok_or_else(|| Error::CollectionNotFound(name.to_string()))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            points_count: entry.points.len() as u64,
            status: "Green".to_string(),
        })
    }

    async fn point_exists(&self, collection: &str, id: Uuid) -> Result<bool> {
        self.limiter.acquire().await;
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        Ok(entry.points.contains_key(&id))
    }

    async fn fetch_content_hash(&self, collection: &str, id: Uuid) -> Result<Option<String>> {
        self.limiter.acquire().await;
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        Ok(entry
            .points
            .get(&id)
            .map(|p| p.payload.content_hash.clone()))
    }

    async fn upsert_chunk(&self, collection: &str, point: ChunkPoint) -> Result<()> {
        self.limiter.acquire().await;
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| Error::CollectionNotFound(collection.to_string()))?;
        entry.points.insert(
            point.id,
            StoredPoint {
                vector: point.vector,
                payload: point.payload,
            },
        );
        Ok(())
    }
}
