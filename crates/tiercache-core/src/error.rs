//! Error types for the tiered cache.
//!
//! Cache bookkeeping failures, remote object store failures and local
//! filesystem failures all surface through [`TierCacheError`] so callers can
//! decide their own retry and timeout policy.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tiered cache.
#[derive(Debug, Error)]
pub enum TierCacheError {
    // Cache bookkeeping errors
    #[error("Cache entry not found: {id}")]
    NotFound { id: String },

    #[error("Cache entry is not pinned: {id}")]
    NotPinned { id: String },

    #[error("Cache entry {id} is still pinned ({pins} active pins)")]
    StillPinned { id: String, pins: u32 },

    #[error("Cache full: need {needed} bytes, {local_size} of {max_size} bytes held by pinned entries")]
    CacheFull {
        needed: u64,
        local_size: u64,
        max_size: u64,
    },

    #[error("Entry of {requested} bytes exceeds cache capacity of {max_size} bytes")]
    CapacityExceeded { requested: u64, max_size: u64 },

    #[error("Cache entry already exists: {id}")]
    AlreadyExists { id: String },

    #[error("Admission of {id} is still in progress")]
    AdmissionInProgress { id: String },

    #[error("Invalid cache id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    // Remote object store errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Object store {operation} of {object} failed with status {status}")]
    RemoteStatus {
        operation: &'static str,
        object: String,
        status: u16,
    },

    #[error("Object not found in store: {object}")]
    ObjectNotFound { object: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for tiered cache operations.
pub type Result<T> = std::result::Result<T, TierCacheError>;

impl From<std::io::Error> for TierCacheError {
    fn from(err: std::io::Error) -> Self {
        TierCacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TierCacheError {
    fn from(err: serde_json::Error) -> Self {
        TierCacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for TierCacheError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TierCacheError::Timeout(std::time::Duration::from_secs(0))
        } else {
            TierCacheError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl TierCacheError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        TierCacheError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if retrying the failed call could succeed.
    ///
    /// The cache never retries on its own; this is a hint for callers that
    /// wrap it in their own retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            TierCacheError::Network { .. } | TierCacheError::Timeout(_) => true,
            TierCacheError::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
            TierCacheError::AdmissionInProgress { .. } => true,
            _ => false,
        }
    }

    /// Whether this error came from the remote object store.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            TierCacheError::Network { .. }
                | TierCacheError::Timeout(_)
                | TierCacheError::RemoteStatus { .. }
                | TierCacheError::ObjectNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TierCacheError::StillPinned {
            id: "seg-7".into(),
            pins: 2,
        };
        assert_eq!(
            err.to_string(),
            "Cache entry seg-7 is still pinned (2 active pins)"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(TierCacheError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(TierCacheError::RemoteStatus {
            operation: "put",
            object: "a".into(),
            status: 503,
        }
        .is_retryable());
        assert!(!TierCacheError::RemoteStatus {
            operation: "put",
            object: "a".into(),
            status: 403,
        }
        .is_retryable());
        assert!(!TierCacheError::NotFound { id: "a".into() }.is_retryable());
    }

    #[test]
    fn test_io_with_path() {
        let err = TierCacheError::io_with_path(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "/cache/a",
        );
        match err {
            TierCacheError::Io { path, .. } => assert_eq!(path, Some(PathBuf::from("/cache/a"))),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_remote_classification() {
        assert!(TierCacheError::ObjectNotFound { object: "a".into() }.is_remote());
        assert!(!TierCacheError::CapacityExceeded {
            requested: 10,
            max_size: 5
        }
        .is_remote());
    }
}
