//! Error types for blob operations.
//!
//! Every failure that leaves the orchestrator is one of these variants. Backend
//! failures are collapsed into [`Error::Backend`] without the root cause; the
//! cause is logged where it happens and kept in [`BackendError`] internally.
//!
//! [`BackendError`]: crate::services::storage::BackendError

use serde::Serialize;

/// Result type for blob operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error category exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    Configuration,
    Backend,
}

/// Blob operation errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed identifier or payload.
    #[error("{0}")]
    Validation(String),

    /// A blob with this identifier already exists.
    #[error("Blob with this ID already exists: {id}")]
    Conflict { id: String },

    /// No metadata record for this identifier.
    #[error("Blob not found: {id}")]
    NotFound { id: String },

    /// Unknown backend or missing required backend settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A backend call was attempted and failed.
    #[error("Failed to {operation} blob data on backend '{backend}'")]
    Backend {
        backend: String,
        operation: &'static str,
    },

    /// The metadata datastore failed.
    #[error("datastore error in {context}: {source}")]
    Datastore {
        context: String,
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a conflict error.
    pub fn conflict(id: impl Into<String>) -> Self {
        Self::Conflict { id: id.into() }
    }

    /// Create a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a collapsed backend error.
    pub fn backend(backend: impl Into<String>, operation: &'static str) -> Self {
        Self::Backend {
            backend: backend.into(),
            operation,
        }
    }

    /// Create a datastore error with context.
    pub fn datastore(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Datastore {
            context: context.into(),
            source,
        }
    }

    /// Category reported to callers.
    ///
    /// Datastore failures are reported as backend failures: from the caller's
    /// point of view a storage system failed after the request was accepted.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Backend { .. } | Self::Datastore { .. } => ErrorCategory::Backend,
        }
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation => 400,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Configuration => 500,
            ErrorCategory::Backend => 502,
        }
    }
}
