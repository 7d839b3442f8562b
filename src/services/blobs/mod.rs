//! Blob orchestration: metadata and content kept consistent.
//!
//! A blob is one metadata record plus content held by exactly one backend.
//! The record names the backend, and every later read or delete goes to that
//! backend, whatever the current default is.
//!
//! Ordering rules:
//!
//! - create: validate, check for conflicts, construct the backend, write
//!   metadata, store content. If the store fails the metadata is removed again.
//! - delete: content first, metadata only after the backend confirmed it.
//! - get: a failed retrieval leaves the record in place.
//!
//! A crash between the metadata write and the content write of a create
//! leaves a record without content. [`BlobService::audit`] reports such
//! records; nothing removes them automatically.
//!
//! # Async Usage
//!
//! All operations block. From async contexts use the `*_async` methods,
//! which run on `spawn_blocking`.

mod async_ops;
mod types;

pub use types::{AuditFinding, AuditStatus, Blob};

use crate::error::{Error, Result};
use crate::services::metadata::{BlobRecord, MetadataStore, Page};
use crate::services::storage::{
    BackendError, BackendKind, BackendProvider, StorageBackend, StorageFactory, validation,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Coordinates the metadata store and storage backends.
///
/// # Thread Safety
///
/// `BlobService` is `Clone` and can be shared across threads. Concurrent
/// creates of one id are settled by the metadata store's primary key.
pub struct BlobService<P: BackendProvider = StorageFactory> {
    metadata: MetadataStore,
    provider: Arc<P>,
}

impl<P: BackendProvider> Clone for BlobService<P> {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            provider: Arc::clone(&self.provider),
        }
    }
}

fn log_backend_failure(backend: &str, id: &str, operation: &str, err: &BackendError) {
    if err.is_not_found() {
        warn!(backend, blob_id = %id, error = %err, "Backend has no content for {operation}");
    } else if err.is_transient() {
        warn!(backend, blob_id = %id, error = %err, "Backend {operation} failed transiently");
    } else {
        error!(backend, blob_id = %id, error = %err, "Backend {operation} failed");
    }
}

impl<P: BackendProvider> BlobService<P> {
    pub fn new(metadata: MetadataStore, provider: P) -> Self {
        Self {
            metadata,
            provider: Arc::new(provider),
        }
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn record(&self, id: &str) -> Result<BlobRecord> {
        self.metadata.get(id)?.ok_or_else(|| Error::not_found(id))
    }

    /// Backend named in a record, built with that backend's own configuration.
    fn backend_for(&self, record: &BlobRecord) -> Result<P::Backend> {
        let kind: BackendKind = record.backend.parse()?;
        self.provider.backend(kind)
    }

    /// Stores a new blob.
    ///
    /// `backend` selects the backend for this blob; `None` uses the
    /// configured default.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty id, an id that is not a single
    ///   path component (`/`, `\`, NUL, `.` or `..`), or a payload that is
    ///   not canonical Base64
    /// - [`Error::Conflict`] if the id is taken
    /// - [`Error::Configuration`] if the backend is unknown or misconfigured
    /// - [`Error::Backend`] if the backend failed to store the content; no
    ///   metadata is left behind
    pub fn create(&self, id: &str, data: &str, backend: Option<&str>) -> Result<BlobRecord> {
        if id.trim().is_empty() || !validation::is_safe_path_component(id) {
            return Err(Error::validation("Invalid ID"));
        }
        if !validation::is_canonical_base64(data) {
            return Err(Error::validation("Invalid data"));
        }
        if self.metadata.exists(id)? {
            return Err(Error::conflict(id));
        }

        let data = data.trim();
        let size = validation::decoded_len(data)
            .filter(|size| *size > 0)
            .ok_or_else(|| Error::validation("Invalid data"))?;

        let kind = match backend {
            Some(name) => name.parse()?,
            None => self.provider.default_kind()?,
        };
        let backend = self.provider.backend(kind)?;
        let backend_name = backend.name();

        let record = BlobRecord::new(id, size, backend_name);
        self.metadata.insert(&record)?;

        if let Err(e) = backend.store(id, data) {
            log_backend_failure(backend_name, id, "store", &e);
            match self.metadata.remove(id) {
                Ok(_) => warn!(backend = backend_name, blob_id = %id, "Removed metadata after failed store"),
                Err(remove_err) => error!(
                    backend = backend_name,
                    blob_id = %id,
                    error = %remove_err,
                    "Failed to remove metadata after failed store"
                ),
            }
            return Err(Error::backend(backend_name, "store"));
        }

        info!(backend = backend_name, blob_id = %id, size, "Blob created");
        Ok(record)
    }

    /// Loads a blob and its content from the backend recorded at creation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no record, or
    /// [`Error::Backend`] if the content could not be retrieved. The record is
    /// left in place either way.
    pub fn get(&self, id: &str) -> Result<Blob> {
        let record = self.record(id)?;
        let backend = self.backend_for(&record)?;

        let data = backend.retrieve(id).map_err(|e| {
            log_backend_failure(&record.backend, id, "retrieve", &e);
            Error::backend(&record.backend, "retrieve")
        })?;

        debug!(backend = %record.backend, blob_id = %id, "Blob retrieved");
        Ok(Blob { record, data })
    }

    /// Deletes a blob: content first, then metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if there is no record, or
    /// [`Error::Backend`] if the backend did not confirm the delete, in which
    /// case the record is kept.
    pub fn delete(&self, id: &str) -> Result<()> {
        let record = self.record(id)?;
        let backend = self.backend_for(&record)?;

        backend.delete(id).map_err(|e| {
            log_backend_failure(&record.backend, id, "delete", &e);
            Error::backend(&record.backend, "delete")
        })?;

        self.metadata.remove(id)?;
        info!(backend = %record.backend, blob_id = %id, "Blob deleted");
        Ok(())
    }

    /// True if a record exists and its backend holds the content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] if the backend could not be asked.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let Some(record) = self.metadata.get(id)? else {
            return Ok(false);
        };
        let backend = self.backend_for(&record)?;

        backend.exists(id).map_err(|e| {
            log_backend_failure(&record.backend, id, "exists", &e);
            Error::backend(&record.backend, "check")
        })
    }

    /// Size reported by the backend, or the recorded size if the backend
    /// cannot say. `None` if there is no record.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata lookup fails or the recorded backend
    /// cannot be constructed.
    pub fn size(&self, id: &str) -> Result<Option<u64>> {
        let Some(record) = self.metadata.get(id)? else {
            return Ok(None);
        };
        let backend = self.backend_for(&record)?;

        match backend.size(id) {
            Ok(size) => Ok(Some(size)),
            Err(e) => {
                debug!(backend = %record.backend, blob_id = %id, error = %e, "Falling back to recorded size");
                Ok(Some(record.size))
            },
        }
    }

    /// Paginated metadata listing, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata query fails.
    pub fn list(&self, page: u32, per_page: u32) -> Result<Page> {
        self.metadata.list(page, per_page)
    }

    /// Checks every record against its backend.
    ///
    /// Report only: records whose content is gone come back as
    /// [`AuditStatus::Missing`], records whose backend could not be built or
    /// asked as [`AuditStatus::Unreachable`]. Nothing is modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata scan fails.
    pub fn audit(&self) -> Result<Vec<AuditFinding>> {
        let records = self.metadata.all()?;
        debug!(count = records.len(), "Auditing blob metadata");

        let mut backends: HashMap<String, std::result::Result<P::Backend, String>> = HashMap::new();
        let mut findings = Vec::new();

        for record in records {
            let backend = backends
                .entry(record.backend.clone())
                .or_insert_with(|| self.backend_for(&record).map_err(|e| e.to_string()));

            let outcome = match backend {
                Ok(backend) => match backend.exists(&record.id) {
                    Ok(true) => None,
                    Ok(false) => Some((AuditStatus::Missing, None)),
                    Err(e) => Some((AuditStatus::Unreachable, Some(e.to_string()))),
                },
                Err(message) => Some((AuditStatus::Unreachable, Some(message.clone()))),
            };

            if let Some((status, detail)) = outcome {
                findings.push(AuditFinding {
                    record,
                    status,
                    detail,
                });
            }
        }

        if findings.is_empty() {
            info!("Audit found no inconsistent blobs");
        } else {
            warn!(count = findings.len(), "Audit found inconsistent blobs");
        }

        Ok(findings)
    }
}
