//! Ingestion pipeline
//!
//! Orchestrates a load run: walk a directory for markdown, screen every
//! path through the access policy, chunk the survivors, then embed and
//! upsert chunks concurrently with content-addressed deduplication.

use crate::chunk::{chunk_text, clean_text, Chunk};
use crate::db::{validate_collection_name, ChunkPayload, ChunkPoint, VectorDatabase};
use crate::embed::Embedder;
use crate::error::{Error, Result};
use crate::identity::{fallback_id, identify};
use crate::policy::PathPolicy;
use crate::progress;
use chrono::Utc;
use futures::future;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Counters reported after a load run
#[derive(Debug, Default, Clone, Serialize)]
pub struct IngestResult {
    pub files_scanned: u64,
    pub files_skipped_by_policy: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub chunks_uploaded: u64,
    pub chunks_skipped_duplicate: u64,
    pub collisions_detected: u64,
    pub chunks_failed: u64,
    pub cancelled: bool,
}

impl IngestResult {
    /// True when at least one chunk could not be stored
    pub fn degraded(&self) -> bool {
        self.chunks_failed > 0
    }
}

enum ChunkOutcome {
    Uploaded,
    SkippedDuplicate,
    CollisionFallback,
    Failed,
}

pub struct Pipeline {
    db: Arc<dyn VectorDatabase>,
    embedder: Arc<dyn Embedder>,
    policy: PathPolicy,
    namespace: String,
    max_workers: usize,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(
        db: Arc<dyn VectorDatabase>,
        embedder: Arc<dyn Embedder>,
        policy: PathPolicy,
        namespace: String,
        max_workers: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            policy,
            namespace,
            max_workers: max_workers.max(1),
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Load every markdown file under `root` into `collection`.
    ///
    /// The run is best-effort: a chunk that fails to embed or upsert is
    /// counted and skipped rather than aborting the run. Setting `stop`
    /// finishes in-flight chunks and returns a partial result.
    pub async fn load_collection(
        &self,
        collection: &str,
        root: &Path,
        chunk_size: usize,
        overlap: usize,
        stop: Arc<AtomicBool>,
    ) -> Result<IngestResult> {
        validate_collection_name(collection)?;
        // CLI overrides merge here, so the window settings are re-checked
        // even when the config file validated fine.
        crate::chunk::validate_chunk_geometry(chunk_size, overlap)?;
        // Surfaces CollectionNotFound before any file is touched.
        self.db.collection_info(collection).await?;

        let decision = self.policy.evaluate(root, true);
        let root = decision.canonical.clone().unwrap_or_else(|| root.to_path_buf());
        if !decision.allowed {
            return Err(Error::InvalidPath(format!(
                "directory '{}' is not accessible: {}",
                root.display(),
                decision.describe()
            )));
        }

        let mut result = IngestResult::default();
        let mut chunks: Vec<Chunk> = Vec::new();

        for path in discover_markdown(&root) {
            if stop.load(Ordering::SeqCst) {
                result.cancelled = true;
                break;
            }
            result.files_scanned += 1;

            let decision = self.policy.evaluate(&path, true);
            if !decision.allowed {
                warn!(path = %path.display(), reason = %decision.describe(), "skipping file");
                result.files_skipped_by_policy += 1;
                continue;
            }

            let text = match read_lossy(&path) {
                Ok(text) => text,
                Err(e) => {
                    // A read failure is not a policy denial; it gets its
                    // own counter so the audit signal stays clean.
                    warn!(path = %path.display(), error = %e, "failed to read file");
                    result.files_failed += 1;
                    continue;
                }
            };

            let source = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            let cleaned = clean_text(&text);
            let file_chunks = chunk_text(&cleaned, &source, chunk_size, overlap)?;
            debug!(path = %path.display(), chunks = file_chunks.len(), "chunked file");
            chunks.extend(file_chunks);
        }

        result.chunks_created = chunks.len() as u64;
        info!(
            collection = %collection,
            files = result.files_scanned,
            chunks = result.chunks_created,
            "starting upload"
        );

        let bar = self
            .show_progress
            .then(|| progress::chunk_bar(result.chunks_created));

        let stop_flag = Arc::clone(&stop);
        let mut outcomes = stream::iter(chunks)
            .take_while(move |_| future::ready(!stop_flag.load(Ordering::SeqCst)))
            .map(|chunk| self.process_chunk(collection, chunk))
            .buffer_unordered(self.max_workers);

        let mut processed = 0u64;
        while let Some(outcome) = outcomes.next().await {
            processed += 1;
            if let Some(bar) = &bar {
                bar.inc(1);
            }
            match outcome {
                ChunkOutcome::Uploaded => result.chunks_uploaded += 1,
                ChunkOutcome::SkippedDuplicate => result.chunks_skipped_duplicate += 1,
                ChunkOutcome::CollisionFallback => {
                    result.collisions_detected += 1;
                    result.chunks_uploaded += 1;
                }
                ChunkOutcome::Failed => result.chunks_failed += 1,
            }
        }
        drop(outcomes);

        // Cancelled only when chunks were actually cut off; a stop raised
        // after the last chunk finished is a complete run.
        result.cancelled = result.cancelled || processed < result.chunks_created;
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        info!(
            collection = %collection,
            uploaded = result.chunks_uploaded,
            skipped = result.chunks_skipped_duplicate,
            failed = result.chunks_failed,
            "load finished"
        );
        Ok(result)
    }

    async fn process_chunk(&self, collection: &str, chunk: Chunk) -> ChunkOutcome {
        match self.try_process_chunk(collection, &chunk).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    source = %chunk.source_path,
                    ordinal = chunk.ordinal,
                    error = %e,
                    "chunk failed"
                );
                ChunkOutcome::Failed
            }
        }
    }

    async fn try_process_chunk(&self, collection: &str, chunk: &Chunk) -> Result<ChunkOutcome> {
        let identity = identify(&chunk.text, &self.namespace);

        if self.db.point_exists(collection, identity.id).await? {
            let stored = self.db.fetch_content_hash(collection, identity.id).await?;
            match stored {
                Some(hash) if hash == identity.content_hash => {
                    debug!(id = %identity.id, "duplicate chunk, skipping");
                    return Ok(ChunkOutcome::SkippedDuplicate);
                }
                _ => {
                    // Same derived id, different content. Keep the occupant
                    // and store this chunk under a random id.
                    let new_id = fallback_id();
                    warn!(
                        id = %identity.id,
                        fallback = %new_id,
                        source = %chunk.source_path,
                        "hash collision detected"
                    );
                    self.upload(collection, new_id, chunk, &identity.content_hash)
                        .await?;
                    return Ok(ChunkOutcome::CollisionFallback);
                }
            }
        }

        self.upload(collection, identity.id, chunk, &identity.content_hash)
            .await?;
        Ok(ChunkOutcome::Uploaded)
    }

    async fn upload(
        &self,
        collection: &str,
        id: Uuid,
        chunk: &Chunk,
        content_hash: &str,
    ) -> Result<()> {
        let vector = self.embedder.embed(&chunk.text).await?;
        let point = ChunkPoint {
            id,
            vector,
            payload: ChunkPayload {
                chunk_text: chunk.text.clone(),
                source_file: chunk.source_path.clone(),
                ordinal: chunk.ordinal as i64,
                namespace: self.namespace.clone(),
                content_hash: content_hash.to_string(),
                updated_at: Utc::now().to_rfc3339(),
            },
        };
        self.db.upsert_chunk(collection, point).await
    }
}

/// Walk `root` for markdown files, respecting ignore rules, in a stable order
fn discover_markdown(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = ignore::WalkBuilder::new(root)
        .follow_links(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
        })
        .collect();
    paths.sort();
    paths
}

/// Read a file as UTF-8, replacing invalid sequences instead of failing
fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
