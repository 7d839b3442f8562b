//! Interchangeable content stores for blob payloads.
//!
//! Four backends share one capability ([`StorageBackend`]): the metadata
//! database itself, a sharded local directory tree, an FTP server, and any
//! S3-compatible endpoint. [`StorageFactory`] turns a backend name plus
//! resolved configuration into a constructed [`Backend`].
//!
//! All backend calls are blocking. Remote backends open a fresh connection
//! per call; nothing is pooled.

mod backend;
mod database;
mod error;
mod factory;
pub mod ftp;
pub mod local;
mod options;
pub mod s3;
pub mod validation;

// Re-export public types
pub use backend::{Backend, BackendKind, StorageBackend};
pub use database::DatabaseBackend;
pub use error::{BackendError, BackendErrorKind, BackendResult};
pub use factory::{BackendProvider, StorageFactory};
pub use ftp::FtpBackend;
pub use local::LocalBackend;
pub use options::BackendOptions;
pub use s3::S3Backend;
