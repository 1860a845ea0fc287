//! Ollama HTTP embedding backend

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};
use crate::throttle::RateLimiter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_ATTEMPTS: u32 = 3;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dimension: usize,
    max_text_chars: usize,
    limiter: RateLimiter,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig, limiter: RateLimiter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            dimension: config.vector_size,
            max_text_chars: config.max_text_chars,
            limiter,
        })
    }

    /// Truncate to the configured character budget, respecting char
    /// boundaries so a multi-byte character is never split.
    fn truncate<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.max_text_chars) {
            Some((byte_index, _)) => &text[..byte_index],
            None => text,
        }
    }

    async fn request_embedding(&self, prompt: &str) -> std::result::Result<Vec<f32>, AttemptError> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt,
            })
            .send()
            .await
            .map_err(|e| AttemptError::Retryable(Error::Http(e)))?;

        let status = response.status();
        if !status.is_success() {
            let error = Error::Embedding(format!(
                "embedding request failed with status {}",
                status
            ));
            // Client errors are deterministic (bad model name, bad request);
            // only server-side failures are worth another attempt.
            return Err(if status.is_client_error() {
                AttemptError::Fatal(error)
            } else {
                AttemptError::Retryable(error)
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Retryable(Error::Http(e)))?;
        if body.embedding.len() != self.dimension {
            return Err(AttemptError::Fatal(Error::Embedding(format!(
                "embedding dimension mismatch for model '{}': expected {}, got {}",
                self.model,
                self.dimension,
                body.embedding.len()
            ))));
        }
        Ok(body.embedding)
    }
}

enum AttemptError {
    /// Transient (timeout, connection, 5xx): worth backing off and retrying
    Retryable(Error),
    /// Deterministic (4xx, wrong dimension): retrying cannot succeed
    Fatal(Error),
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prompt = self.truncate(text);
        if prompt.len() < text.len() {
            debug!(
                limit = self.max_text_chars,
                original = text.chars().count(),
                "truncated text before embedding"
            );
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            self.limiter.acquire().await;
            match self.request_embedding(prompt).await {
                Ok(vector) => return Ok(vector),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Retryable(e)) => {
                    // Exponential backoff: 1s, 2s, 4s
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "embedding request failed"
                    );
                    last_error = Some(e);
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::Embedding("embedding request failed".to_string())))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
