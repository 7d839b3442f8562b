//! Structured backend failures.
//!
//! Adapters keep the cause of every failure here. The orchestrator only looks
//! at whether a call failed; the retry layer looks at [`BackendError::is_transient`].

use std::io;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// What kind of failure a backend call ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BackendErrorKind {
    /// The object does not exist.
    #[error("not found")]
    NotFound,
    /// Timeout or dropped connection; worth retrying.
    #[error("transient")]
    Transient,
    /// The remote side refused the operation (auth, permissions, bad path).
    #[error("permission")]
    Permission,
    /// Unexpected protocol response (HTTP status, malformed reply).
    #[error("protocol")]
    Protocol,
    /// Local I/O failure.
    #[error("io")]
    Io,
    /// The payload was rejected before any I/O happened.
    #[error("invalid")]
    Invalid,
}

/// A failed backend call.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct BackendError {
    kind: BackendErrorKind,
    message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Invalid, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Protocol, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Permission, message)
    }

    /// Classify an I/O error. Timeouts and resets are transient.
    pub fn io(context: &str, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => BackendErrorKind::Transient,
            io::ErrorKind::NotFound => BackendErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => BackendErrorKind::Permission,
            _ => BackendErrorKind::Io,
        };
        Self::new(kind, format!("{context}: {err}"))
    }

    pub fn kind(&self) -> BackendErrorKind {
        self.kind
    }

    pub fn is_transient(&self) -> bool {
        self.kind == BackendErrorKind::Transient
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == BackendErrorKind::NotFound
    }
}
