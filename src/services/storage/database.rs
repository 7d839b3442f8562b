//! Database-backed storage backend.
//!
//! Keeps the Base64 text itself in the `blob_storages` table of the shared
//! datastore. Nothing is decoded on write, which makes this the cheapest
//! backend and the natural choice for tests and small deployments.

use super::backend::StorageBackend;
use super::error::{BackendError, BackendErrorKind, BackendResult};
use super::validation;
use crate::services::datastore::Datastore;
use chrono::{SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};

/// Storage backend that keeps content next to the metadata.
#[derive(Clone)]
pub struct DatabaseBackend {
    db: Datastore,
}

fn sql_error(operation: &str, id: &str, err: &rusqlite::Error) -> BackendError {
    tracing::error!(backend = "database", blob_id = %id, error = %err, "Database {operation} error");
    BackendError::new(
        BackendErrorKind::Io,
        format!("database {operation} failed for {id}: {err}"),
    )
}

impl DatabaseBackend {
    pub fn new(db: Datastore) -> Self {
        Self { db }
    }

    fn load(&self, id: &str) -> BackendResult<Option<String>> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT data FROM blob_storages WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| sql_error("retrieve", id, &e))
    }
}

impl StorageBackend for DatabaseBackend {
    fn name(&self) -> &'static str {
        "database"
    }

    fn store(&self, id: &str, data: &str) -> BackendResult<()> {
        if !validation::is_decodable(data) {
            return Err(BackendError::invalid(format!("payload for {id} is not Base64")));
        }

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO blob_storages (id, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![id, data.trim(), now],
        )
        .map_err(|e| sql_error("store", id, &e))?;

        Ok(())
    }

    fn retrieve(&self, id: &str) -> BackendResult<String> {
        self.load(id)?
            .ok_or_else(|| BackendError::not_found(format!("no database content for {id}")))
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        let conn = self.db.lock();
        let removed = conn
            .execute("DELETE FROM blob_storages WHERE id = ?1", params![id])
            .map_err(|e| sql_error("delete", id, &e))?;

        if removed == 0 {
            return Err(BackendError::not_found(format!("no database content for {id}")));
        }
        Ok(())
    }

    fn exists(&self, id: &str) -> BackendResult<bool> {
        Ok(self.load(id)?.is_some())
    }

    fn size(&self, id: &str) -> BackendResult<u64> {
        let data = self.retrieve(id)?;
        validation::decoded_len(&data)
            .ok_or_else(|| BackendError::protocol(format!("stored content for {id} is not Base64")))
    }
}
