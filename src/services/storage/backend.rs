//! Backend capability and the closed set of backend variants.
//!
//! Every backend stores opaque bytes addressed by a blob identifier and speaks
//! Base64 text at its boundary: `store` decodes before writing (except the
//! database backend, which keeps the text), `retrieve` returns canonical
//! Base64 of the stored bytes.

use super::database::DatabaseBackend;
use super::error::BackendResult;
use super::ftp::FtpBackend;
use super::local::LocalBackend;
use super::s3::S3Backend;
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Capability shared by all storage backends.
///
/// Implementations must be thread-safe (`Send + Sync`). Overwrite semantics of
/// `store` for an existing id are backend-defined; every built-in backend
/// overwrites.
///
/// # Example
///
/// ```ignore
/// use blobgate::services::storage::{LocalBackend, StorageBackend};
///
/// let backend = LocalBackend::open("/var/lib/blobgate/blobs")?;
/// backend.store("blob-1", "aGk=")?;
/// assert_eq!(backend.retrieve("blob-1")?, "aGk=");
/// ```
pub trait StorageBackend: Send + Sync {
    /// Backend name as recorded in blob metadata.
    fn name(&self) -> &'static str;

    /// Persists the decoded bytes of `data` under `id`.
    ///
    /// # Errors
    ///
    /// Returns an `Invalid` error if `data` does not decode, or the
    /// underlying failure otherwise.
    fn store(&self, id: &str, data: &str) -> BackendResult<()>;

    /// Returns the canonical Base64 form of the stored bytes.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if nothing is stored under `id`.
    fn retrieve(&self, id: &str) -> BackendResult<String>;

    /// Removes the content stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if nothing is stored under `id`.
    fn delete(&self, id: &str) -> BackendResult<()>;

    /// Checks whether content exists under `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be asked.
    fn exists(&self, id: &str) -> BackendResult<bool>;

    /// Size in bytes of the decoded content.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if nothing is stored under `id`.
    fn size(&self, id: &str) -> BackendResult<u64>;
}

/// Registered backend names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Database,
    Local,
    Ftp,
    S3,
}

impl BackendKind {
    pub const ALL: [Self; 4] = [Self::Database, Self::Local, Self::Ftp, Self::S3];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Database => "database",
            Self::Local => "local",
            Self::Ftp => "ftp",
            Self::S3 => "s3",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::configuration(format!("Unknown storage type: {name}")))
    }
}

/// A constructed backend, one variant per registered kind.
pub enum Backend {
    Database(DatabaseBackend),
    Local(LocalBackend),
    Ftp(FtpBackend),
    S3(S3Backend),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Database(_) => BackendKind::Database,
            Self::Local(_) => BackendKind::Local,
            Self::Ftp(_) => BackendKind::Ftp,
            Self::S3(_) => BackendKind::S3,
        }
    }

    fn inner(&self) -> &dyn StorageBackend {
        match self {
            Self::Database(backend) => backend,
            Self::Local(backend) => backend,
            Self::Ftp(backend) => backend,
            Self::S3(backend) => backend,
        }
    }
}

impl StorageBackend for Backend {
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    fn store(&self, id: &str, data: &str) -> BackendResult<()> {
        self.inner().store(id, data)
    }

    fn retrieve(&self, id: &str) -> BackendResult<String> {
        self.inner().retrieve(id)
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        self.inner().delete(id)
    }

    fn exists(&self, id: &str) -> BackendResult<bool> {
        self.inner().exists(id)
    }

    fn size(&self, id: &str) -> BackendResult<u64> {
        self.inner().size(id)
    }
}
