//! Blob storage gateway.
//!
//! Accepts Base64-encoded payloads, stores them through one of several
//! interchangeable backends chosen per blob, and later reads or deletes them
//! through the backend recorded at creation time.
//!
//! - [`services::storage`] - backend capability, the database, local, FTP and
//!   S3 backends, and the factory that builds them by name
//! - [`services::metadata`] - blob records in SQLite
//! - [`services::blobs`] - [`BlobService`], the create/get/delete orchestrator
//! - [`config`] - settings, environment snapshot and per-backend resolution
//!
//! # Example
//!
//! ```ignore
//! use blobgate::config::{ConfigResolver, Environment, Settings};
//! use blobgate::services::{datastore::Datastore, metadata::MetadataStore, storage::StorageFactory};
//! use blobgate::BlobService;
//!
//! let datastore = Datastore::open("storage/blobgate.sqlite3")?;
//! let resolver = ConfigResolver::new(Settings::default(), Environment::capture());
//! let service = BlobService::new(
//!     MetadataStore::new(datastore.clone()),
//!     StorageFactory::new(resolver, datastore),
//! );
//!
//! let record = service.create("blob-1", "aGk=", Some("local"))?;
//! assert_eq!(record.size, 2);
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod reliability;
pub mod services;

pub use error::{Error, ErrorCategory, Result};
pub use services::blobs::{Blob, BlobService};
