//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here
//! We use `thiserror` for ergonomic error definition and better error messages

use reqwest::StatusCode;
use thiserror::Error;

use crate::storage::types::{BlobPath, InvalidNameError};

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// a path given by the caller failed validation
    #[error("invalid path: {0}")]
    InvalidPath(#[from] InvalidNameError),

    /// a batch operation was called with no paths at all
    #[error("path collection cannot be empty")]
    EmptyPathCollection,

    /// network-level fault from the HTTP client
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// network-level fault reported by a non-reqwest transport
    #[error("transport error: {0}")]
    TransportFailure(String),

    /// the remote API answered with a non-success status
    #[error("error {operation} {path} on GitHub: {status}, {message}")]
    Remote {
        operation: &'static str,
        path: BlobPath,
        status: StatusCode,
        message: String,
    },

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// the base64 content payload could not be decoded
    #[error("content decode error: {0}")]
    Decode(#[from] base64::DecodeError),

    /// the remote entry has an unexpected type
    #[error("unexpected entry type at {path}: expected {expected}, found {found}")]
    UnexpectedEntryType {
        path: BlobPath,
        expected: &'static str,
        found: String,
    },

    /// the remote listing returned a folder that was already traversed
    #[error("traversal cycle: folder {0} listed twice")]
    TraversalCycle(BlobPath),

    /// the caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// the entry point is not supported by this backend
    #[error("{0} is not supported by the GitHub blob storage")]
    Unsupported(&'static str),

    /// the connection configuration is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Remote { status, .. } if *status == StatusCode::NOT_FOUND)
    }

    /// check if this error is a stale or missing concurrency token
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::Remote { status, .. }
                if *status == StatusCode::CONFLICT || *status == StatusCode::UNPROCESSABLE_ENTITY
        )
    }

    /// check if this error is recoverable by retry
    ///
    /// the storage layer itself never retries, this is for callers that do.
    pub fn is_retriable(&self) -> bool {
        match self {
            StorageError::Transport(_) | StorageError::TransportFailure(_) => true,
            StorageError::Remote { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    /// check if the caller passed bad input
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, StorageError::InvalidPath(_) | StorageError::EmptyPathCollection)
    }

    pub(crate) fn remote(
        operation: &'static str,
        path: &BlobPath,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        StorageError::Remote {
            operation,
            path: path.clone(),
            status,
            message: message.into(),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: StatusCode) -> StorageError {
        StorageError::remote("deleting file", &BlobPath::new("a.txt").unwrap(), status, "nope")
    }

    #[test]
    fn test_error_classification() {
        let not_found = remote(StatusCode::NOT_FOUND);
        assert!(not_found.is_not_found());
        assert!(!not_found.is_conflict());

        let conflict = remote(StatusCode::CONFLICT);
        assert!(!conflict.is_not_found());
        assert!(conflict.is_conflict());
        assert!(remote(StatusCode::UNPROCESSABLE_ENTITY).is_conflict());
    }

    #[test]
    fn test_error_retriable() {
        assert!(remote(StatusCode::BAD_GATEWAY).is_retriable());
        assert!(remote(StatusCode::TOO_MANY_REQUESTS).is_retriable());
        assert!(!remote(StatusCode::CONFLICT).is_retriable());
        assert!(StorageError::TransportFailure("reset".into()).is_retriable());
        assert!(!StorageError::Cancelled.is_retriable());
    }

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = remote(StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "error deleting file a.txt on GitHub: 409 Conflict, nope");
    }

    #[test]
    fn test_invalid_input() {
        assert!(StorageError::EmptyPathCollection.is_invalid_input());
        assert!(StorageError::from(InvalidNameError::Empty).is_invalid_input());
        assert!(!StorageError::Cancelled.is_invalid_input());
    }
}
