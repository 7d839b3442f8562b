//! Blob gateway services.
//!
//! - [`datastore`] - shared SQLite connection and schema
//! - [`metadata`] - blob records
//! - [`storage`] - backend capability, adapters and factory
//! - [`blobs`] - the orchestrator tying metadata and content together

pub mod blobs;
pub mod datastore;
pub mod metadata;
pub mod storage;
