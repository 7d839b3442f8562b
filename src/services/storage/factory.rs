//! Backend construction by name.

use super::backend::{Backend, BackendKind, StorageBackend};
use super::database::DatabaseBackend;
use super::ftp::FtpBackend;
use super::local::LocalBackend;
use super::options::BackendOptions;
use super::s3::S3Backend;
use crate::config::ConfigResolver;
use crate::error::Result;
use crate::services::datastore::Datastore;
use std::sync::Arc;

/// Supplies constructed backends to the blob orchestrator.
pub trait BackendProvider: Send + Sync {
    type Backend: StorageBackend;

    /// Backend used for new blobs when the caller names none.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configured default is unknown.
    fn default_kind(&self) -> Result<BackendKind>;

    /// Constructs the backend of the given kind with its own configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if required settings are missing.
    fn backend(&self, kind: BackendKind) -> Result<Self::Backend>;
}

/// Builds backends from the registry of [`BackendKind`]s and a
/// [`ConfigResolver`].
///
/// # Thread Safety
///
/// `StorageFactory` is `Clone` and cheap to share; the resolver is immutable.
#[derive(Clone)]
pub struct StorageFactory {
    resolver: Arc<ConfigResolver>,
    datastore: Datastore,
}

impl StorageFactory {
    /// # Arguments
    ///
    /// * `resolver` - Source of per-backend configuration
    /// * `datastore` - Shared datastore, used by the database backend
    pub fn new(resolver: ConfigResolver, datastore: Datastore) -> Self {
        Self {
            resolver: Arc::new(resolver),
            datastore,
        }
    }

    pub fn resolver(&self) -> &ConfigResolver {
        &self.resolver
    }

    /// Looks `name` up in the registry and constructs it.
    ///
    /// `explicit` options are layered over the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) for an
    /// unknown name or missing required settings.
    pub fn build(&self, name: &str, explicit: Option<&BackendOptions>) -> Result<Backend> {
        self.create(name.parse()?, explicit)
    }

    /// Constructs a backend of a known kind.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if required settings are missing.
    pub fn create(&self, kind: BackendKind, explicit: Option<&BackendOptions>) -> Result<Backend> {
        let options = self.resolver.resolve(kind, explicit);

        let backend = match kind {
            BackendKind::Database => Backend::Database(DatabaseBackend::new(self.datastore.clone())),
            BackendKind::Local => Backend::Local(LocalBackend::from_options(&options)?),
            BackendKind::Ftp => Backend::Ftp(FtpBackend::from_options(&options)?),
            BackendKind::S3 => Backend::S3(S3Backend::from_options(&options)?),
        };

        tracing::debug!(backend = %kind, "Constructed storage backend");
        Ok(backend)
    }
}

impl BackendProvider for StorageFactory {
    type Backend = Backend;

    fn default_kind(&self) -> Result<BackendKind> {
        self.resolver.default_backend()
    }

    fn backend(&self, kind: BackendKind) -> Result<Backend> {
        self.create(kind, None)
    }
}
