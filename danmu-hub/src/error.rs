//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// Per-adapter failures never surface here: the engine converts them into
/// "no contribution" at the call boundary. What remains is input validation,
/// admission denial, and infrastructure conditions the caller may want to
/// distinguish. None of these are fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
    #[error("One source is unavailable: {source_name}: {message}")]
    AdapterUnavailable { source_name: String, message: String },

    #[error("Cannot make sense of input: {0}")]
    AmbiguousInput(String),

    #[error("Rate limited: client {0} exceeded the request window")]
    RateLimited(String),

    #[error("Durable mirror unavailable: {0}")]
    MirrorUnavailable(String),

    #[error("Durable mirror payload corrupt for aggregate {0}")]
    CacheCorrupt(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn adapter(source_name: impl Into<String>, err: &danmu_sources::SourceError) -> Self {
        Self::AdapterUnavailable {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }
}
