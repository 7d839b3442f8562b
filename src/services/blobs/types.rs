//! Values returned by the blob orchestrator.

use crate::services::metadata::BlobRecord;
use serde::Serialize;

/// A blob together with its content.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Blob {
    #[serde(flatten)]
    pub record: BlobRecord,
    /// Canonical Base64 of the stored bytes
    pub data: String,
}

/// Why an audited record is suspect.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// The backend answered and has no content for the record.
    Missing,
    /// The backend could not be built or did not answer.
    Unreachable,
}

/// One record flagged by [`BlobService::audit`](super::BlobService::audit).
#[derive(Debug, Clone, Serialize)]
pub struct AuditFinding {
    pub record: BlobRecord,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
