use archivist::commands::{collections, load};
use archivist::config::Config;
use archivist::db::{create_database, Distance};
use archivist::embed::create_embedder;
use archivist::progress::ProgressWriterFactory;
use archivist::throttle::RateLimiter;
use archivist::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "archivist", version, about = "Load markdown documents into a vector database")]
struct Cli {
    /// Path to a config file (defaults to ~/.archivist/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a collection
    Create {
        collection: String,

        /// Distance metric: Cosine, Euclid, or Dot
        #[arg(long, default_value = "Cosine")]
        distance: Distance,

        /// Vector dimension (defaults to the configured embedding size)
        #[arg(long)]
        vector_size: Option<usize>,
    },

    /// Delete a collection and all its points
    Delete { collection: String },

    /// Remove all points from a collection without deleting it
    Clear { collection: String },

    /// List collections
    List,

    /// Show collection details
    Info { collection: String },

    /// Load markdown files from a directory into a collection
    Load {
        collection: String,

        /// Directory to scan for .md files
        path: PathBuf,

        /// Words per chunk (overrides config)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlapping words between chunks (overrides config)
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Generate shell completions
    Completions { shell: Shell },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(ProgressWriterFactory)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<bool> {
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "archivist", &mut std::io::stdout());
        return Ok(true);
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_from(None)?,
    };

    let (db_limiter, embed_limiter) = if config.rate_limit.disabled {
        (RateLimiter::disabled(), RateLimiter::disabled())
    } else {
        (
            RateLimiter::new(config.rate_limit.db_per_second, config.rate_limit.burst),
            RateLimiter::new(
                config.rate_limit.embedding_per_second,
                config.rate_limit.burst,
            ),
        )
    };

    let db = create_database(&config.database.kind, &config.database.url, db_limiter)?;

    match cli.command {
        Commands::Create {
            collection,
            distance,
            vector_size,
        } => {
            let size = vector_size.unwrap_or(config.embedding.vector_size);
            collections::create(db, &collection, distance, size, cli.json).await?;
        }
        Commands::Delete { collection } => {
            collections::delete(db, &collection, cli.json).await?;
        }
        Commands::Clear { collection } => {
            collections::clear(db, &collection, cli.json).await?;
        }
        Commands::List => {
            collections::list(db, cli.json).await?;
        }
        Commands::Info { collection } => {
            collections::info(db, &collection, cli.json).await?;
        }
        Commands::Load {
            collection,
            path,
            chunk_size,
            overlap,
        } => {
            let embedder = create_embedder(&config.embedding, embed_limiter)?;

            let stop = Arc::new(AtomicBool::new(false));
            let stop_signal = Arc::clone(&stop);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received, finishing in-flight chunks");
                    stop_signal.store(true, Ordering::SeqCst);
                }
            });

            let result = load::run(
                &config, db, embedder, &collection, &path, chunk_size, overlap, cli.json, stop,
            )
            .await?;
            return Ok(!result.degraded());
        }
        Commands::Completions { .. } => unreachable!(),
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
