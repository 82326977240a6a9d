//! Error types for Planet Atlas

use thiserror::Error;

/// The main error type for Planet Atlas operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Durable payload could not be decoded
    #[error("Storage corrupt: {0}")]
    StorageCorrupt(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced session does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A reply for this session is still in flight
    #[error("Reply pending for session {0}")]
    ReplyPending(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for Planet Atlas operations
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
