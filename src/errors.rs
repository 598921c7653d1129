//! Error types for the log-ingestion pipeline
//!
//! `LogError` is what the ingestion service hands back to its callers.
//! `RecoveryError` is only produced while seeding the identifier generator
//! at startup and is never surfaced over HTTP.

use thiserror::Error;

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum LogError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Persistence failed: {operation} - {source}")]
    Persistence {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Type alias for Result with LogError
pub type LogResult<T> = Result<T, LogError>;

impl LogError {
    /// Create a validation error for a single inbound field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a persistence error wrapping the underlying storage failure
    pub fn persistence(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, LogError::Validation { .. })
    }

    pub fn is_persistence(&self) -> bool {
        matches!(self, LogError::Persistence { .. })
    }
}

/// Failure to determine the last identifier already durable in a store.
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("store holds no data records")]
    Empty,

    #[error("store could not be read: {source}")]
    Unreadable {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

impl RecoveryError {
    pub fn unreadable(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unreadable {
            source: Box::new(source),
        }
    }
}

/// Raised when a stored string does not name a known level.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid log level: {0}")]
pub struct InvalidLevel(pub String);

/// Convert from csv errors
impl From<csv::Error> for LogError {
    fn from(err: csv::Error) -> Self {
        LogError::persistence("csv_operation", err)
    }
}

impl From<figment::Error> for LogError {
    fn from(err: figment::Error) -> Self {
        LogError::config(err.to_string())
    }
}
