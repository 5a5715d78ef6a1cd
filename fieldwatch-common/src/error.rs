//! Common error types for fieldwatch

use thiserror::Error;

/// Common result type for fieldwatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the fieldwatch crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Write rejected outright (second form for an agent, video cap reached, ...)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Vision service could not read the scanned form
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
