//! Shared SQLite datastore for blob metadata and database-backed content.

use crate::error::{Error, Result};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS blobs (
        id TEXT PRIMARY KEY NOT NULL,
        size INTEGER NOT NULL CHECK (size > 0),
        storage_type TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS index_blobs_on_created_at ON blobs (created_at);

    CREATE TABLE IF NOT EXISTS blob_storages (
        id TEXT PRIMARY KEY NOT NULL,
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
";

/// Handle to the application's SQLite database.
///
/// `Datastore` is `Clone`; clones share one connection guarded by a mutex, so
/// statements from different threads are serialized.
#[derive(Clone)]
pub struct Datastore {
    conn: Arc<Mutex<Connection>>,
}

impl Datastore {
    /// Opens or creates a file-backed datastore and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or the schema cannot be applied.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::configuration(format!(
                    "Failed to create datastore directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::datastore(format!("open {}", path.display()), e))?;
        Self::init(conn)
    }

    /// Opens a private in-memory datastore.
    ///
    /// # Errors
    ///
    /// Returns an error if SQLite cannot allocate the database.
    pub fn memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| Error::datastore("open in-memory", e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::datastore("apply schema", e))?;
        tracing::debug!("Datastore schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Locks the connection for the duration of the guard.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

/// Returns true if the error is a uniqueness/primary key violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
