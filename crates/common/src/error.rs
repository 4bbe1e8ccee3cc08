//! Common error types for the poller components.

use std::fmt;

/// A specialized Result type for poller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for poller operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a new probe error.
    pub fn probe(msg: impl fmt::Display) -> Self {
        Error::Probe(msg.to_string())
    }

    /// Create a new persistence error.
    pub fn persistence(msg: impl fmt::Display) -> Self {
        Error::Persistence(msg.to_string())
    }
}
