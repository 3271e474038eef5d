//! Unified error handling for the newsdesk crate
//!
//! This module provides a single `Error` enum consolidating the domain
//! error taxonomy, while keeping the feed-specific errors usable on their
//! own where the pipeline needs them.
//!
//! # Architecture
//!
//! - [`Error`] - Unified error enum used across module boundaries
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//!
//! Validation and conflict errors are surfaced to the caller and never
//! retried; transport and format errors are recorded on the offending feed
//! and only retried on the next scheduled or manual fetch.

use std::io;
use thiserror::Error;

// Re-export feed errors for convenience
pub use crate::utils::error::{FeedParseError, FetchError};

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or missing input
    Validation,
    /// The request contradicts existing state (duplicates, cycles, guarded deletes)
    Conflict,
    /// A referenced entity does not exist
    NotFound,
    /// The caller is not allowed to perform the operation
    Forbidden,
    /// Network-related errors (HTTP, timeout)
    Network,
    /// Feed payload parsing errors
    Format,
    /// Storage and I/O errors
    Storage,
    /// Configuration errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the newsdesk crate
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing input; surfaced directly, no retry
    #[error("Validation error: {0}")]
    Validation(String),

    /// Request conflicts with existing state; surfaced with a readable reason
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Referenced entity missing
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// Caller lacks permission for the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Feed transport errors (HTTP failure, timeout)
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Feed payload format errors (unparseable XML, unsupported shape)
    #[error("Feed parse error: {0}")]
    Parse(#[from] FeedParseError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Forbidden(_) => ErrorCategory::Forbidden,
            Self::Fetch(_) => ErrorCategory::Network,
            Self::Parse(_) => ErrorCategory::Format,
            Self::Database(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Format,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Check if this error is recoverable by retrying later
    ///
    /// Only transport failures qualify; everything else needs a changed
    /// request or upstream fix.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Io(_))
    }
}

// Conversion from rusqlite::Error
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category() {
        assert_eq!(
            Error::validation("bad enum value").category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            Error::conflict("slug already in use").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            Error::not_found("news", 42).category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            Error::Fetch(FetchError::Timeout).category(),
            ErrorCategory::Network
        );
        assert_eq!(
            Error::Parse(FeedParseError::UnsupportedFormat).category(),
            ErrorCategory::Format
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::Fetch(FetchError::Timeout).is_recoverable());
        assert!(!Error::Parse(FeedParseError::UnsupportedFormat).is_recoverable());
        assert!(!Error::validation("nope").is_recoverable());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("category", "sports");
        assert_eq!(err.to_string(), "category not found: sports");
    }
}
