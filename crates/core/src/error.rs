//! Error types for the document store
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Two outcomes are deliberately *not* errors:
//! - a read of a missing key returns `Ok(None)`
//! - a poll that runs out of time returns `Ok(vec![])`

use crate::json::LimitError;
use crate::patch::PatchError;
use std::io;
use thiserror::Error;

/// Result type alias for document store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the document store
#[derive(Debug, Error)]
pub enum Error {
    /// A value was rejected before any state was mutated
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The query could not be compiled (unknown operator, bad regex, too deep)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A patch could not be replayed onto a value
    #[error("Invalid patch: {0}")]
    InvalidPatch(#[from] PatchError),

    /// Envelope encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Backend failure other than not-found
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded or is invalid
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        Error::InvalidValue(e.to_string())
    }
}

impl Error {
    /// True for errors caused by the caller's input rather than the backend
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidValue(_) | Error::InvalidQuery(_) | Error::InvalidPatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_value() {
        let err = Error::InvalidValue("too large".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Invalid value"));
        assert!(msg.contains("too large"));
    }

    #[test]
    fn test_error_display_invalid_query() {
        let err = Error::InvalidQuery("unknown variant `between`".to_string());
        assert!(err.to_string().contains("Invalid query"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_error_from_serde_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: Error = result.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_from_limit() {
        let err: Error = LimitError::NestingTooDeep { depth: 101, max: 100 }.into();
        assert!(matches!(err, Error::InvalidValue(_)));
        assert!(err.is_caller_error());
        assert!(err.to_string().contains("101"));
    }

    #[test]
    fn test_error_from_patch() {
        let err: Error = PatchError::PathNotFound("/a/b".to_string()).into();
        assert!(matches!(err, Error::InvalidPatch(_)));
        assert!(err.to_string().contains("/a/b"));
    }
}
