//! Embedding backends
//!
//! Text goes in, a fixed-dimension vector comes out. The concrete backend
//! is selected at startup through [`create_embedder`]; the pipeline only
//! sees the [`Embedder`] trait.

pub mod http;

pub use http::OllamaEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::Result;
use crate::throttle::RateLimiter;
use async_trait::async_trait;
use std::sync::Arc;

/// Abstract embedding interface
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text into a vector of `dimension()` floats
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Expected vector dimension
    fn dimension(&self) -> usize;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

/// Build the embedding backend from configuration
pub fn create_embedder(
    config: &EmbeddingConfig,
    limiter: RateLimiter,
) -> Result<Arc<dyn Embedder>> {
    Ok(Arc::new(OllamaEmbedder::new(config, limiter)?))
}
