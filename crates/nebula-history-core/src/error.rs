//! Error types for Nebula history core.

use thiserror::Error;

/// Core errors raised while parsing identifiers or handling payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("malformed identifier: {0}")]
    MalformedIdentifier(String),

    #[error("invalid access scope: {0:?}")]
    InvalidScope(String),

    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
