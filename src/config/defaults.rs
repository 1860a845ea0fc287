//! Default values for configuration

/// Default database adapter kind
pub fn default_database_kind() -> String {
    "qdrant".to_string()
}

/// Default Qdrant URL for local development
pub fn default_database_url() -> String {
    "http://127.0.0.1:6334".to_string()
}

/// Default Ollama embeddings endpoint
pub fn default_embedding_url() -> String {
    "http://localhost:11434/api/embeddings".to_string()
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "nomic-embed-text:latest".to_string()
}

/// Default embedding request timeout in seconds
pub fn default_embedding_timeout() -> u64 {
    60
}

/// Default embedding vector dimension (nomic-embed-text)
pub fn default_vector_size() -> usize {
    768
}

/// Default maximum characters sent per embedding request
pub fn default_max_text_chars() -> usize {
    5000
}

/// Default chunk size in words
pub fn default_chunk_size() -> usize {
    800
}

/// Default overlap between chunks in words
pub fn default_chunk_overlap() -> usize {
    100
}

/// Default database requests per second
pub fn default_db_rate_limit() -> f64 {
    100.0
}

/// Default embedding requests per second
pub fn default_embedding_rate_limit() -> f64 {
    10.0
}

/// Default token bucket capacity (burst size)
pub fn default_rate_limit_burst() -> f64 {
    1.0
}

/// Default soft-block mode for system directories
pub fn default_soft_block_mode() -> String {
    "deny".to_string()
}

/// Default namespace for content identities
pub fn default_namespace() -> String {
    "archivist".to_string()
}

/// Default number of concurrent chunk workers
pub fn default_max_workers() -> usize {
    4
}
