//! Error types for guichet-core

use thiserror::Error;

/// Result type alias using guichet-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in guichet-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error talking to a remote API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Malformed or unexpected payload from the DS API
    #[error("DS API error: {0}")]
    DsApi(String),

    /// The transactional-email API rejected a request
    #[error("Email API error: {0}")]
    Email(String),

    /// The DS API rejected a mutation. Carries the remote-provided message
    /// verbatim so callers can tell "already in state X" from transport
    /// failures.
    #[error("{0}")]
    DsRejected(String),
}

impl Error {
    /// Whether this error is a business-level rejection from the DS API.
    pub const fn is_ds_rejection(&self) -> bool {
        matches!(self, Self::DsRejected(_))
    }
}
