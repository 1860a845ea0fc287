//! Load command: ingest a directory of markdown into a collection

use super::print_json;
use crate::config::Config;
use crate::db::VectorDatabase;
use crate::embed::Embedder;
use crate::error::Result;
use crate::pipeline::{IngestResult, Pipeline};
use crate::policy::PathPolicy;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    config: &Config,
    db: Arc<dyn VectorDatabase>,
    embedder: Arc<dyn Embedder>,
    collection: &str,
    path: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
    json: bool,
    stop: Arc<AtomicBool>,
) -> Result<IngestResult> {
    let policy = PathPolicy::from_config(&config.security)?;
    let pipeline = Pipeline::new(
        db,
        embedder,
        policy,
        config.namespace.clone(),
        config.max_workers,
    )
    .with_progress(!json);

    let chunk_size = chunk_size.unwrap_or(config.chunk.chunk_size);
    let overlap = overlap.unwrap_or(config.chunk.overlap);

    let started = Instant::now();
    let result = pipeline
        .load_collection(collection, path, chunk_size, overlap, stop)
        .await?;
    let elapsed = started.elapsed();

    if json {
        print_json(&result)?;
        return Ok(result);
    }

    if result.cancelled {
        println!("Load interrupted, partial results:");
    }
    println!("Loaded '{}' in {:.1}s", collection, elapsed.as_secs_f64());
    println!("  Files scanned:      {}", result.files_scanned);
    println!("  Skipped by policy:  {}", result.files_skipped_by_policy);
    if result.files_failed > 0 {
        println!("  Files unreadable:   {}", result.files_failed);
    }
    println!("  Chunks created:     {}", result.chunks_created);
    println!("  Chunks uploaded:    {}", result.chunks_uploaded);
    println!("  Duplicates skipped: {}", result.chunks_skipped_duplicate);
    if result.collisions_detected > 0 {
        println!("  Collisions:         {}", result.collisions_detected);
    }
    if result.chunks_failed > 0 {
        println!("  Chunks failed:      {}", result.chunks_failed);
    }
    Ok(result)
}
