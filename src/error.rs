//! Error types for the generation pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors from the Language Model Provider boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("rate limited by provider")]
    RateLimited,

    #[error("provider error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    #[error("provider request timed out")]
    Timeout,
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            // Rate limits and timeouts are transient
            ProviderError::RateLimited | ProviderError::Timeout => true,
            ProviderError::Api { status, .. } => matches!(status, 502 | 503 | 504),
            // Request errors depend on the underlying cause
            ProviderError::Request(e) => e.is_timeout() || e.is_connect(),
            // Missing models and malformed responses are not retryable
            ProviderError::ModelNotFound(_) | ProviderError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to text chunking.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("invalid chunking input: {0}")]
    InvalidInput(String),
}

/// Errors related to embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Errors related to document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("membership query too large: {0} ids")]
    TooManyIds(usize),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Other(String),
}

/// Errors related to semantic retrieval.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(
        "embedding model mismatch: query embedded with {query_model}, chunk {chunk_id} stored with {stored_model}"
    )]
    ModelMismatch {
        chunk_id: String,
        stored_model: String,
        query_model: String,
    },
}

/// Errors related to token budget planning.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid planning input: {0}")]
    InvalidInput(String),
}

/// Errors from the generation orchestrator.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("input too large for any useful output")]
    ContextExhausted,

    #[error("malformed generation output ({length} chars, all parse strategies exhausted)")]
    MalformedOutput { length: usize },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    Path(String),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Other(String),
}
