//! Vector database port
//!
//! The loader consumes the vector database through this narrow interface.
//! Adapters are registered in [`create_database`], an explicit factory keyed
//! by name and wired at startup, so backend selection is deterministic and
//! testable. Collection names are validated here, caller-side: an invalid
//! name never reaches an adapter.

pub mod memory;
pub mod qdrant;

pub use memory::MemoryDb;
pub use qdrant::QdrantDb;

use crate::error::{Error, Result};
use crate::throttle::RateLimiter;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Distance metric for a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

impl FromStr for Distance {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "Cosine" => Ok(Self::Cosine),
            "Euclid" => Ok(Self::Euclid),
            "Dot" => Ok(Self::Dot),
            other => Err(Error::Config(format!(
                "Invalid distance metric '{}'. Valid options are: Cosine, Euclid, Dot",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cosine => "Cosine",
            Self::Euclid => "Euclid",
            Self::Dot => "Dot",
        };
        f.write_str(name)
    }
}

/// Payload stored with each chunk point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    /// Cleaned chunk text
    pub chunk_text: String,

    /// Source file, relative to the loaded directory
    pub source_file: String,

    /// 1-based chunk position within the file
    pub ordinal: i64,

    /// Namespace the identity was derived in
    pub namespace: String,

    /// Hex blake3 digest of namespace + text, read back for collision checks
    pub content_hash: String,

    /// When this point was last written
    pub updated_at: String,
}

/// A point ready to be upserted
#[derive(Debug, Clone)]
pub struct ChunkPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

/// Information about a collection
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: u64,
    pub status: String,
}

/// Abstract vector database interface (port)
#[async_trait]
pub trait VectorDatabase: Send + Sync {
    /// Create a collection; succeeds without change if it already exists
    async fn create_collection(
        &self,
        name: &str,
        distance: Distance,
        vector_size: usize,
    ) -> Result<()>;

    /// Delete a collection; errors if it does not exist
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Remove all points from a collection without deleting it
    async fn clear_collection(&self, name: &str) -> Result<()>;

    /// List collection names
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Get information about a collection
    async fn collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Check whether a point with this id exists
    async fn point_exists(&self, collection: &str, id: Uuid) -> Result<bool>;

    /// Fetch the stored content hash for a point, if present
    async fn fetch_content_hash(&self, collection: &str, id: Uuid) -> Result<Option<String>>;

    /// Insert or replace one chunk point
    async fn upsert_chunk(&self, collection: &str, point: ChunkPoint) -> Result<()>;
}

fn collection_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Must start alphanumeric; then alphanumeric, hyphen, underscore, dot;
    // 1-63 characters (common database limits).
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,62}$").unwrap())
}

/// Validate a collection name before it reaches any adapter
pub fn validate_collection_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidCollectionName(
            "collection name cannot be empty".to_string(),
        ));
    }
    if !collection_name_re().is_match(name) {
        return Err(Error::InvalidCollectionName(format!(
            "'{}': names must start with an alphanumeric character, contain only \
             alphanumerics, hyphens, underscores, and dots, and be 1-63 characters",
            name
        )));
    }
    Ok(())
}

/// Create a vector database adapter by kind.
///
/// The registry is populated here, at startup; adding an adapter means
/// adding an arm. The database rate limiter is injected so every adapter
/// call is throttled.
pub fn create_database(
    kind: &str,
    url: &str,
    limiter: RateLimiter,
) -> Result<Arc<dyn VectorDatabase>> {
    match kind {
        "qdrant" => Ok(Arc::new(QdrantDb::connect(url, limiter)?)),
        "memory" => Ok(Arc::new(MemoryDb::new(limiter))),
        other => Err(Error::Config(format!(
            "Unsupported database kind '{}'. Supported kinds: qdrant, memory",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_collection_names() {
        for name in ["adrs", "team-a.adrs_2024", "A", "0docs", &"x".repeat(63)] {
            assert!(validate_collection_name(name).is_ok(), "{} rejected", name);
        }
    }

    #[test]
    fn test_invalid_collection_names() {
        for name in ["", "-leading-dash", ".dot", "_under", "has space", "semi;colon", &"x".repeat(64)]
        {
            assert!(
                validate_collection_name(name).is_err(),
                "{:?} accepted",
                name
            );
        }
    }

    #[test]
    fn test_distance_parsing() {
        assert_eq!("Cosine".parse::<Distance>().unwrap(), Distance::Cosine);
        assert_eq!("Euclid".parse::<Distance>().unwrap(), Distance::Euclid);
        assert_eq!("Dot".parse::<Distance>().unwrap(), Distance::Dot);
        assert!("cosine".parse::<Distance>().is_err());
        assert!("Manhattan".parse::<Distance>().is_err());
    }

    #[test]
    fn test_unknown_adapter_kind_rejected() {
        let err = create_database("pinecone", "http://localhost", RateLimiter::disabled());
        assert!(err.is_err());
    }
}
