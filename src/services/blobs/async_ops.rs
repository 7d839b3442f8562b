//! Async wrappers for blob operations.
//!
//! These methods wrap the blocking operations in `spawn_blocking` so backend
//! I/O does not stall the async runtime. The inner [`Error`] is kept in the
//! returned `anyhow::Error` and can be recovered with `downcast_ref`.
//!
//! [`Error`]: crate::Error

use anyhow::{Context, Result};

use super::{Blob, BlobService};
use crate::services::metadata::{BlobRecord, Page};
use crate::services::storage::BackendProvider;

impl<P: BackendProvider + 'static> BlobService<P> {
    /// Async version of [`create`](Self::create).
    pub async fn create_async(
        &self,
        id: String,
        data: String,
        backend: Option<String>,
    ) -> Result<BlobRecord> {
        let service = self.clone();
        let record = tokio::task::spawn_blocking(move || {
            service.create(&id, &data, backend.as_deref())
        })
        .await
        .context("Task join error")??;
        Ok(record)
    }

    /// Async version of [`get`](Self::get).
    pub async fn get_async(&self, id: String) -> Result<Blob> {
        let service = self.clone();
        let blob = tokio::task::spawn_blocking(move || service.get(&id))
            .await
            .context("Task join error")??;
        Ok(blob)
    }

    /// Async version of [`delete`](Self::delete).
    pub async fn delete_async(&self, id: String) -> Result<()> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.delete(&id))
            .await
            .context("Task join error")??;
        Ok(())
    }

    /// Async version of [`list`](Self::list).
    pub async fn list_async(&self, page: u32, per_page: u32) -> Result<Page> {
        let service = self.clone();
        let page = tokio::task::spawn_blocking(move || service.list(page, per_page))
            .await
            .context("Task join error")??;
        Ok(page)
    }
}
