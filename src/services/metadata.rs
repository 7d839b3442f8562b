//! Blob metadata records and the store that keeps them.
//!
//! One row per blob in the `blobs` table. Records are write-once: they are
//! inserted by a successful create and removed by a successful delete (or by
//! create compensation). The primary key enforces identifier uniqueness, so
//! two racing inserts for the same id resolve to exactly one winner.

use super::datastore::{Datastore, is_constraint_violation};
use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 10;
/// Largest page size a listing will return.
pub const MAX_PER_PAGE: u32 = 100;

/// Metadata for a stored blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobRecord {
    /// Caller-supplied identifier
    pub id: String,
    /// Decoded size in bytes
    pub size: u64,
    /// Backend that holds the content
    pub backend: String,
    /// Timestamp when the blob was created
    pub created_at: DateTime<Utc>,
}

impl BlobRecord {
    /// Creates a record stamped with the current time.
    ///
    /// The timestamp is truncated to microseconds, the precision it is stored with.
    pub fn new(id: impl Into<String>, size: u64, backend: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size,
            backend: backend.into(),
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}

/// One page of a metadata listing, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub data: Vec<BlobRecord>,
    pub page: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Repository for blob records.
#[derive(Clone)]
pub struct MetadataStore {
    db: Datastore,
}

fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<BlobRecord> {
    let size: i64 = row.get(1)?;
    let created_at: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(BlobRecord {
        id: row.get(0)?,
        size: u64::try_from(size).unwrap_or_default(),
        backend: row.get(2)?,
        created_at,
    })
}

impl MetadataStore {
    pub fn new(db: Datastore) -> Self {
        Self { db }
    }

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if a record with the same id exists, or
    /// [`Error::Validation`] if the size is zero.
    pub fn insert(&self, record: &BlobRecord) -> Result<()> {
        if record.size == 0 {
            return Err(Error::validation("Size must be greater than 0"));
        }
        let size = i64::try_from(record.size)
            .map_err(|_| Error::validation("Size exceeds the supported range"))?;

        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO blobs (id, size, storage_type, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                record.id,
                size,
                record.backend,
                encode_timestamp(&record.created_at)
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                Error::conflict(&record.id)
            } else {
                Error::datastore(format!("insert metadata {}", record.id), e)
            }
        })?;

        Ok(())
    }

    /// Loads a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: &str) -> Result<Option<BlobRecord>> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT id, size, storage_type, created_at FROM blobs WHERE id = ?1",
            params![id],
            record_from_row,
        )
        .optional()
        .map_err(|e| Error::datastore(format!("load metadata {id}"), e))
    }

    /// Checks whether a record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let conn = self.db.lock();
        conn.query_row("SELECT 1 FROM blobs WHERE id = ?1", params![id], |_| Ok(()))
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| Error::datastore(format!("check metadata {id}"), e))
    }

    /// Removes a record. Returns whether a record was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM blobs WHERE id = ?1", params![id])
            .map(|n| n > 0)
            .map_err(|e| Error::datastore(format!("remove metadata {id}"), e))
    }

    /// Number of records.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<u64> {
        let conn = self.db.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM blobs", [], |row| row.get(0))
            .map_err(|e| Error::datastore("count metadata", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// Lists records newest first.
    ///
    /// `page` starts at 1; values below 1 are treated as 1. `per_page` outside
    /// `1..=100` falls back to 10.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, page: u32, per_page: u32) -> Result<Page> {
        let page = page.max(1);
        let per_page = if (1..=MAX_PER_PAGE).contains(&per_page) {
            per_page
        } else {
            DEFAULT_PER_PAGE
        };

        let total_count = self.count()?;
        let offset = u64::from(page - 1) * u64::from(per_page);

        let data = {
            let conn = self.db.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id, size, storage_type, created_at FROM blobs \
                     ORDER BY created_at DESC, id ASC LIMIT ?1 OFFSET ?2",
                )
                .map_err(|e| Error::datastore("prepare metadata listing", e))?;
            let rows = stmt
                .query_map(
                    params![i64::from(per_page), i64::try_from(offset).unwrap_or(i64::MAX)],
                    record_from_row,
                )
                .map_err(|e| Error::datastore("list metadata", e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| Error::datastore("read metadata row", e))?
        };

        let total_pages = total_count.div_ceil(u64::from(per_page));

        Ok(Page {
            data,
            page,
            per_page,
            total_count,
            total_pages,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        })
    }

    /// Every record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn all(&self) -> Result<Vec<BlobRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn
            .prepare("SELECT id, size, storage_type, created_at FROM blobs ORDER BY created_at ASC, id ASC")
            .map_err(|e| Error::datastore("prepare metadata scan", e))?;
        let rows = stmt
            .query_map([], record_from_row)
            .map_err(|e| Error::datastore("scan metadata", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::datastore("read metadata row", e))
    }
}
