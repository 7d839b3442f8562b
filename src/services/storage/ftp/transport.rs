//! FTP connection seam.
//!
//! [`FtpTransport`] opens one authenticated session per backend operation.
//! [`SuppaTransport`] is the production implementation over `suppaftp`.

use super::FtpSettings;
use crate::services::storage::error::{BackendError, BackendResult};
use std::io::Cursor;
use std::net::ToSocketAddrs;
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream, Mode};

/// Timeout for establishing the control connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Timeout for reads on the control connection.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// One logged-in FTP session.
pub trait FtpSession {
    fn cwd(&mut self, path: &str) -> BackendResult<()>;
    fn mkdir(&mut self, path: &str) -> BackendResult<()>;
    fn put(&mut self, path: &str, data: &[u8]) -> BackendResult<()>;
    fn get(&mut self, path: &str) -> BackendResult<Vec<u8>>;
    fn size(&mut self, path: &str) -> BackendResult<u64>;
    fn remove(&mut self, path: &str) -> BackendResult<()>;
    /// Ends the session. Errors are ignored; the connection is gone either way.
    fn close(&mut self);
}

/// Opens sessions: connect, authenticate, set transfer mode and timeouts.
pub trait FtpTransport: Send + Sync {
    type Session: FtpSession;

    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or refuses the login.
    fn connect(&self, settings: &FtpSettings) -> BackendResult<Self::Session>;
}

/// Maps `suppaftp` errors onto backend error kinds.
///
/// Socket failures keep their I/O classification (timeouts and resets are
/// transient). Negative server replies are treated as permission failures.
pub(crate) fn map_ftp_error(context: &str, err: FtpError) -> BackendError {
    match err {
        FtpError::ConnectionError(io) => BackendError::io(context, &io),
        FtpError::UnexpectedResponse(_) => BackendError::permission(format!("{context}: {err}")),
        other => BackendError::protocol(format!("{context}: {other}")),
    }
}

/// Production transport backed by `suppaftp`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuppaTransport;

/// A `suppaftp` control connection.
pub struct SuppaSession(FtpStream);

impl SuppaTransport {
    fn setup(stream: &mut FtpStream, settings: &FtpSettings) -> BackendResult<()> {
        stream
            .login(settings.username.as_str(), settings.password.as_str())
            .map_err(|e| map_ftp_error("ftp login", e))?;
        stream.set_mode(if settings.passive {
            Mode::Passive
        } else {
            Mode::Active
        });
        stream
            .get_ref()
            .set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| BackendError::io("ftp set read timeout", &e))?;
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| map_ftp_error("ftp binary mode", e))
    }
}

impl FtpTransport for SuppaTransport {
    type Session = SuppaSession;

    fn connect(&self, settings: &FtpSettings) -> BackendResult<SuppaSession> {
        let addr = (settings.host.as_str(), settings.port)
            .to_socket_addrs()
            .map_err(|e| BackendError::io("ftp resolve", &e))?
            .next()
            .ok_or_else(|| {
                BackendError::protocol(format!("ftp host did not resolve: {}", settings.host))
            })?;

        let mut stream = FtpStream::connect_timeout(addr, CONNECT_TIMEOUT)
            .map_err(|e| map_ftp_error("ftp connect", e))?;

        if let Err(e) = Self::setup(&mut stream, settings) {
            let _ = stream.quit();
            return Err(e);
        }

        Ok(SuppaSession(stream))
    }
}

impl FtpSession for SuppaSession {
    fn cwd(&mut self, path: &str) -> BackendResult<()> {
        self.0.cwd(path).map_err(|e| map_ftp_error("ftp cwd", e))
    }

    fn mkdir(&mut self, path: &str) -> BackendResult<()> {
        self.0.mkdir(path).map_err(|e| map_ftp_error("ftp mkdir", e))
    }

    fn put(&mut self, path: &str, data: &[u8]) -> BackendResult<()> {
        self.0
            .put_file(path, &mut Cursor::new(data))
            .map(|_| ())
            .map_err(|e| map_ftp_error("ftp put", e))
    }

    fn get(&mut self, path: &str) -> BackendResult<Vec<u8>> {
        self.0
            .retr_as_buffer(path)
            .map(Cursor::into_inner)
            .map_err(|e| map_ftp_error("ftp get", e))
    }

    fn size(&mut self, path: &str) -> BackendResult<u64> {
        self.0
            .size(path)
            .map(|size| size as u64)
            .map_err(|e| map_ftp_error("ftp size", e))
    }

    fn remove(&mut self, path: &str) -> BackendResult<()> {
        self.0.rm(path).map_err(|e| map_ftp_error("ftp delete", e))
    }

    fn close(&mut self) {
        if let Err(e) = self.0.quit() {
            tracing::debug!(error = %e, "FTP quit failed");
        }
    }
}
