//! Error types for storage operations.
//!
//! All fallible operations in this crate return [`Result<T>`], with
//! [`StorageError`] covering the full failure taxonomy of the storage
//! contract. Backend SDK errors are translated at the adapter boundary so
//! the composite layer never has to reason about provider-specific failures.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, StorageError>;

/// The unified error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The addressed object does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The path that could not be resolved.
        path: String,
    },

    /// An object already exists where one must not.
    ///
    /// Reserved: every operation in the current contract is idempotent or
    /// overwrite-based, so no primitive produces this today.
    #[error("already exists: {path}")]
    AlreadyExists {
        /// The conflicting path.
        path: String,
    },

    /// A non-recursive delete was attempted on a directory with contents.
    #[error("directory not empty: {path}")]
    DirectoryNotEmpty {
        /// The directory that still has children.
        path: String,
    },

    /// An operation was invoked before `connect` or after `disconnect`.
    #[error("backend is not connected")]
    NotConnected,

    /// The backend rejected the configured credentials.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Backend-reported reason.
        message: String,
    },

    /// Transient network or backend I/O failure.
    #[error("connection error: {message}")]
    Connection {
        /// Human-readable description of the failure.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The account properties are missing or malformed for this backend.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A recursive operation completed for some sub-paths but not others.
    #[error("partial failure: {} sub-path(s) failed", failed_paths.len())]
    PartialFailure {
        /// The sub-paths whose transfer or copy failed.
        failed_paths: Vec<String>,
    },

    /// Local-disk I/O failed while staging an upload or download.
    #[error("i/o error on {path}")]
    Io {
        /// The local path involved.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backend returned a response outside the contract taxonomy.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the unexpected response.
        message: String,
    },
}

impl StorageError {
    /// Create a `NotFound` error for the given path.
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a `Configuration` error from a message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a `Connection` error from a message and source error.
    pub fn connection(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a `Backend` error from a message only.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Create an `Io` error for a local path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the addressed object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Translate an opendal error into the contract taxonomy.
pub(crate) fn from_opendal(path: &str, err: opendal::Error) -> StorageError {
    match err.kind() {
        opendal::ErrorKind::NotFound => StorageError::NotFound {
            path: path.to_string(),
        },
        opendal::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
            path: path.to_string(),
        },
        opendal::ErrorKind::PermissionDenied => StorageError::Authentication {
            message: err.to_string(),
        },
        opendal::ErrorKind::ConfigInvalid => StorageError::Configuration {
            message: err.to_string(),
        },
        _ => StorageError::Connection {
            message: format!("backend i/o failed for {path}"),
            source: Some(Box::new(err)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_not_found() {
        assert!(StorageError::not_found("a/b").is_not_found());
        assert!(!StorageError::NotConnected.is_not_found());
    }

    #[test]
    fn test_partial_failure_display() {
        let err = StorageError::PartialFailure {
            failed_paths: vec!["a/b".to_string(), "a/c".to_string()],
        };
        assert_eq!(err.to_string(), "partial failure: 2 sub-path(s) failed");
    }
}
