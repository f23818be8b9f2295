//! Error types for cairn
//!
//! Explicit error variants with context, using thiserror.

use thiserror::Error;

/// Result type alias for cairn operations
pub type Result<T> = std::result::Result<T, Error>;

/// Cairn error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Persisted State Errors
    // =========================================================================
    /// No persisted state under the given name. Often the trigger for a
    /// create path rather than a failure.
    #[error("{kind} not found: {namespace}/{name}")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// State is absent and the caller has no right to create it
    #[error("not authorized: {reason}")]
    NotAuthorized { reason: String },

    /// A create-if-absent lost a race against another writer
    #[error("{kind} already exists: {namespace}/{name}")]
    Conflict {
        kind: String,
        namespace: String,
        name: String,
    },

    #[error("Storage read failed: {key}, reason: {reason}")]
    StorageReadFailed { key: String, reason: String },

    #[error("Storage write failed: {key}, reason: {reason}")]
    StorageWriteFailed { key: String, reason: String },

    // =========================================================================
    // Content Errors
    // =========================================================================
    /// A persisted or supplied value could not be parsed
    #[error("parse error in {field}: {reason}")]
    Parse { field: String, reason: String },

    // =========================================================================
    // Rendering Errors
    // =========================================================================
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("key generation failed for {entity}: {reason}")]
    KeyGeneration { entity: String, reason: String },

    /// Something the caller waits on is not there yet
    #[error("unavailable, retry later: {reason}")]
    RetryableUnavailable { reason: String },

    #[error("operation cancelled: {operation}")]
    Cancelled { operation: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {reason}")]
    Internal { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a not found error
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a parse error
    pub fn parse(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an I/O error bound to a path
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Create a retryable-unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::RetryableUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Check if this error means "nothing persisted yet"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a lost create race
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Check if this error is retriable
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::RetryableUnavailable { .. }
                | Self::StorageReadFailed { .. }
                | Self::StorageWriteFailed { .. }
                | Self::Conflict { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("secret", "rook-ceph", "rook-ceph-mon");
        assert!(err.to_string().contains("rook-ceph/rook-ceph-mon"));

        let err = Error::parse("maxMonId", "invalid digit");
        assert!(err.to_string().contains("maxMonId"));
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::not_found("secret", "ns", "x").is_not_found());
        assert!(Error::conflict("secret", "ns", "x").is_conflict());
        assert!(Error::unavailable("not yet").is_retriable());
        assert!(!Error::NotAuthorized {
            reason: "read-only".into()
        }
        .is_retriable());
        assert!(!Error::parse("data", "bad").is_retriable());
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = Error::io(
            "/var/lib/cairn/x.config",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/var/lib/cairn/x.config"));
    }
}
