//! FTP storage backend.
//!
//! Every operation opens its own session, runs, and closes the session again,
//! whether the operation succeeded or not. Content lives at
//! `<remote_path>/<id>`; the remote directory is created on first store.
//!
//! Store, retrieve and delete retry transient failures (timeouts, resets)
//! under [`RetryPolicy::ftp`]. Permission failures are final.

pub mod transport;

use super::backend::StorageBackend;
use super::error::{BackendError, BackendResult};
use super::options::BackendOptions;
use super::validation;
use crate::error::Result;
use crate::reliability::retry::{RetryPolicy, retry_sync};
use std::fmt;
use transport::{FtpSession, FtpTransport, SuppaTransport};

pub const DEFAULT_PORT: u16 = 21;
pub const DEFAULT_REMOTE_PATH: &str = "/blobs";

/// Connection settings for the FTP backend.
#[derive(Clone, PartialEq, Eq)]
pub struct FtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Absolute remote directory, always starting with `/`.
    pub remote_path: String,
    pub passive: bool,
}

impl fmt::Debug for FtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("remote_path", &self.remote_path)
            .field("passive", &self.passive)
            .finish()
    }
}

impl FtpSettings {
    /// Reads `host`, `username`, `password` (required) and `port`,
    /// `remote_path`, `passive` (optional).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required field is missing or the
    /// port is not a number.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        Ok(Self {
            host: options.required("ftp", "host")?,
            username: options.required("ftp", "username")?,
            password: options.required("ftp", "password")?,
            port: options.port_or("ftp", "port", DEFAULT_PORT)?,
            remote_path: normalize_remote_path(&options.string_or("remote_path", DEFAULT_REMOTE_PATH)),
            passive: options.flag_or("passive", true),
        })
    }

    /// Remote path of a blob. The id must be a single path component.
    fn file_path(&self, id: &str) -> BackendResult<String> {
        if !validation::is_safe_path_component(id) {
            return Err(BackendError::invalid(format!(
                "blob id cannot be used as a remote file name: {id:?}"
            )));
        }

        Ok(if self.remote_path == "/" {
            format!("/{id}")
        } else {
            format!("{}/{id}", self.remote_path)
        })
    }
}

/// Leading `/` added, trailing `/` removed (except for the root itself).
fn normalize_remote_path(path: &str) -> String {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Closes the wrapped session when dropped.
struct Connection<S: FtpSession>(S);

impl<S: FtpSession> Drop for Connection<S> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Creates each segment of `path` that cannot be entered.
fn ensure_remote_directory<S: FtpSession>(session: &mut S, path: &str) -> BackendResult<()> {
    let mut current = String::new();
    for part in path.split('/').filter(|p| !p.is_empty()) {
        current.push('/');
        current.push_str(part);

        match session.cwd(&current) {
            Ok(()) => {},
            Err(e) if e.is_transient() => return Err(e),
            Err(_) => {
                session.mkdir(&current).inspect_err(|e| {
                    tracing::error!(backend = "ftp", path = %current, error = %e, "Failed to create FTP directory");
                })?;
                tracing::info!(backend = "ftp", path = %current, "Created FTP directory");
            },
        }
    }
    Ok(())
}

/// `SIZE` succeeding means the file exists. Negative replies mean it does not.
fn file_exists<S: FtpSession>(session: &mut S, path: &str) -> BackendResult<bool> {
    match session.size(path) {
        Ok(_) => Ok(true),
        Err(e) if e.is_transient() => Err(e),
        Err(_) => Ok(false),
    }
}

/// FTP storage backend, generic over its transport.
pub struct FtpBackend<T: FtpTransport = SuppaTransport> {
    settings: FtpSettings,
    transport: T,
    retry: RetryPolicy,
}

impl FtpBackend {
    /// Builds the production backend from its option map.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if host or credentials are missing.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        Ok(Self::with_transport(
            FtpSettings::from_options(options)?,
            SuppaTransport,
        ))
    }
}

impl<T: FtpTransport> FtpBackend<T> {
    pub fn with_transport(settings: FtpSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
            retry: RetryPolicy::ftp(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &FtpSettings {
        &self.settings
    }

    fn with_connection<R>(
        &self,
        op: impl FnOnce(&mut T::Session) -> BackendResult<R>,
    ) -> BackendResult<R> {
        let mut conn = Connection(self.transport.connect(&self.settings)?);
        op(&mut conn.0)
    }

    fn retried<R>(
        &self,
        operation: &str,
        id: &str,
        mut op: impl FnMut(&mut T::Session) -> BackendResult<R>,
    ) -> BackendResult<R> {
        retry_sync(
            &self.retry,
            operation,
            || self.with_connection(&mut op),
            BackendError::is_transient,
        )
        .inspect_err(|e| {
            tracing::error!(backend = "ftp", blob_id = %id, error = %e, "{operation} failed");
        })
    }
}

impl<T: FtpTransport> StorageBackend for FtpBackend<T> {
    fn name(&self) -> &'static str {
        "ftp"
    }

    fn store(&self, id: &str, data: &str) -> BackendResult<()> {
        if !validation::is_decodable(data) {
            return Err(BackendError::invalid(format!("payload for {id} is not Base64")));
        }
        let bytes = validation::decode(data)
            .map_err(|e| BackendError::invalid(format!("payload for {id} is not Base64: {e}")))?;
        let path = self.settings.file_path(id)?;

        self.retried("ftp store", id, |session| {
            ensure_remote_directory(session, &self.settings.remote_path)?;
            session.put(&path, &bytes)
        })
    }

    fn retrieve(&self, id: &str) -> BackendResult<String> {
        let path = self.settings.file_path(id)?;
        let bytes = self.retried("ftp retrieve", id, |session| session.get(&path))?;
        Ok(validation::encode(&bytes))
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        let path = self.settings.file_path(id)?;
        self.retried("ftp delete", id, |session| {
            if !file_exists(session, &path)? {
                return Err(BackendError::not_found(format!("no ftp file at {path}")));
            }
            session.remove(&path)
        })
    }

    fn exists(&self, id: &str) -> BackendResult<bool> {
        let path = self.settings.file_path(id)?;
        self.with_connection(|session| file_exists(session, &path))
    }

    fn size(&self, id: &str) -> BackendResult<u64> {
        let path = self.settings.file_path(id)?;
        self.with_connection(|session| session.size(&path))
    }
}
