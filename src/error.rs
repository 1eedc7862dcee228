//! Custom error types for affilscan.
//!
//! All fallible library functions return `Result<T, AffilscanError>`.

use thiserror::Error;

/// Main error type for affilscan operations.
#[derive(Debug, Error)]
pub enum AffilscanError {
    /// Request input rejected before any work was done
    #[error("Validation error: {0}")]
    Validation(String),

    /// Literature API answered with a non-success status
    #[error("Upstream error: {status} - {message}")]
    Upstream {
        /// HTTP status code returned by the API
        status: u16,
        /// Short description of the failing call
        message: String,
    },

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),

    /// SQLite error
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// Store unusable for a reason other than a SQLite error
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl AffilscanError {
    /// True for errors caused by the caller rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, AffilscanError::Validation(_))
    }
}

/// Result type alias using `AffilscanError`
pub type Result<T> = std::result::Result<T, AffilscanError>;
