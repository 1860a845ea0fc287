//! Configuration management for archivist
//!
//! Handles loading, saving, and validating configuration from TOML files,
//! with environment variable overrides for deployment-sensitive values.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Vector database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Embedding backend configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunk: ChunkConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Path security configuration
    #[serde(default)]
    pub security: SecurityConfig,

    /// Namespace mixed into every content identity
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Concurrent chunk workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// Vector database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Adapter kind ("qdrant" or "memory")
    #[serde(default = "default_database_kind")]
    pub kind: String,

    /// Connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embeddings endpoint URL
    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name/identifier
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Embedding dimension (must match model)
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,

    /// Maximum characters sent per request (longer chunks are truncated)
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
}

/// Chunking configuration (word counts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Words per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Overlapping words between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Disable rate limiting entirely (development only)
    #[serde(default)]
    pub disabled: bool,

    /// Database requests per second
    #[serde(default = "default_db_rate_limit")]
    pub db_per_second: f64,

    /// Embedding requests per second
    #[serde(default = "default_embedding_rate_limit")]
    pub embedding_per_second: f64,

    /// Token bucket capacity (maximum immediate burst)
    #[serde(default = "default_rate_limit_burst")]
    pub burst: f64,
}

/// Path security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Additional literal paths to block (must be absolute)
    #[serde(default)]
    pub restricted_paths: Vec<PathBuf>,

    /// Glob patterns to block (e.g. "/var/secrets/**")
    #[serde(default)]
    pub denied_patterns: Vec<String>,

    /// Glob patterns to permit, overriding denied patterns
    #[serde(default)]
    pub allowed_patterns: Vec<String>,

    /// How to treat soft-blocked system directories: "deny" or "warn"
    #[serde(default = "default_soft_block_mode")]
    pub soft_block_mode: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            restricted_paths: Vec::new(),
            denied_patterns: Vec::new(),
            allowed_patterns: Vec::new(),
            soft_block_mode: default_soft_block_mode(),
        }
    }
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for archivist data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk: ChunkConfig::default(),
            rate_limit: RateLimitConfig::default(),
            security: SecurityConfig::default(),
            namespace: default_namespace(),
            max_workers: default_max_workers(),
            paths: PathsConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            kind: default_database_kind(),
            url: default_database_url(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            vector_size: default_vector_size(),
            max_text_chars: default_max_text_chars(),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            db_per_second: default_db_rate_limit(),
            embedding_per_second: default_embedding_rate_limit(),
            burst: default_rate_limit_burst(),
        }
    }
}

impl Config {
    /// Get the default base directory for archivist (~/.archivist)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".archivist")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            base_dir: base,
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific base directory, falling back to defaults
    pub fn load_from(base_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::default();
        config.init_paths(base_dir);

        if config.paths.config_file.exists() {
            debug!("Loading config from {:?}", config.paths.config_file);
            let content = std::fs::read_to_string(&config.paths.config_file)?;
            let mut loaded: Config = toml::from_str(&content)?;
            loaded.paths = config.paths;
            config = loaded;
        } else {
            debug!("No config file found, using defaults");
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Apply environment variable overrides on top of file values
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("QDRANT_URL") {
            self.database.url = url;
        }
        if let Ok(kind) = std::env::var("VECTOR_DB_KIND") {
            self.database.kind = kind.to_lowercase();
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.embedding.url = url;
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(value) = std::env::var("RATE_LIMITING_DISABLED") {
            self.rate_limit.disabled = matches!(value.to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Ok(value) = std::env::var("DB_RATE_LIMIT") {
            match value.parse::<f64>() {
                Ok(rate) => self.rate_limit.db_per_second = rate,
                Err(_) => warn!("Invalid DB_RATE_LIMIT value: {}", value),
            }
        }
        if let Ok(value) = std::env::var("EMBEDDING_RATE_LIMIT") {
            match value.parse::<f64>() {
                Ok(rate) => self.rate_limit.embedding_per_second = rate,
                Err(_) => warn!("Invalid EMBEDDING_RATE_LIMIT value: {}", value),
            }
        }
    }

    /// Validate configuration
    ///
    /// Relative `restricted_paths` entries are a hard error at load time;
    /// they are never silently resolved against the working directory.
    pub fn validate(&self) -> Result<()> {
        if self.chunk.chunk_size == 0 {
            return Err(Error::Config(
                "chunk.chunk_size must be positive".to_string(),
            ));
        }

        if self.chunk.overlap >= self.chunk.chunk_size {
            return Err(Error::Config(
                "chunk.overlap must be < chunk.chunk_size".to_string(),
            ));
        }

        if self.rate_limit.db_per_second <= 0.0 {
            return Err(Error::Config(
                "rate_limit.db_per_second must be positive".to_string(),
            ));
        }

        if self.rate_limit.embedding_per_second <= 0.0 {
            return Err(Error::Config(
                "rate_limit.embedding_per_second must be positive".to_string(),
            ));
        }

        if self.rate_limit.burst < 1.0 {
            return Err(Error::Config(
                "rate_limit.burst must be >= 1".to_string(),
            ));
        }

        if self.embedding.vector_size == 0 {
            return Err(Error::Config(
                "embedding.vector_size must be positive".to_string(),
            ));
        }

        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be positive".to_string()));
        }

        url::Url::parse(&self.embedding.url)
            .map_err(|e| Error::Config(format!("embedding.url is not a valid URL: {}", e)))?;

        match self.security.soft_block_mode.as_str() {
            "deny" | "warn" => {}
            other => {
                return Err(Error::Config(format!(
                    "security.soft_block_mode must be 'deny' or 'warn', got '{}'",
                    other
                )));
            }
        }

        for path in &self.security.restricted_paths {
            if !path.is_absolute() {
                return Err(Error::Config(format!(
                    "security.restricted_paths entry '{}' is not absolute",
                    path.display()
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.kind, "qdrant");
        assert_eq!(config.chunk.chunk_size, 800);
        assert_eq!(config.chunk.overlap, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.namespace = "test_namespace".to_string();

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(loaded.namespace, "test_namespace");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunk.overlap = config.chunk.chunk_size;
        assert!(config.validate().is_err());

        config.chunk.overlap = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_relative_restricted_path_rejected() {
        let mut config = Config::default();
        config
            .security
            .restricted_paths
            .push(PathBuf::from("etc/secrets"));

        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_invalid_soft_block_mode_rejected() {
        let mut config = Config::default();
        config.security.soft_block_mode = "maybe".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        let mut config = Config::default();
        config.rate_limit.db_per_second = 0.0;
        assert!(config.validate().is_err());
    }
}
