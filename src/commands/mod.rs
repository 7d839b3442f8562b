//! CLI command implementations for blobgate.
//!
//! - [`blob`] - put/get/delete/list
//! - [`admin`] - backend inspection and audit
//!
//! Every command prints one JSON document on stdout. Failures print
//! `{"success": false, ...}` and exit non-zero.

pub mod admin;
pub mod blob;

use anyhow::{Context, Result};
use blobgate::BlobService;
use blobgate::config::{ConfigResolver, Environment, Settings};
use blobgate::services::datastore::Datastore;
use blobgate::services::metadata::MetadataStore;
use blobgate::services::storage::StorageFactory;
use serde::Serialize;
use std::process::ExitCode;

/// Opens the datastore and wires the orchestrator to the production factory.
pub fn open_service(settings: Settings) -> Result<BlobService> {
    let datastore = Datastore::open(&settings.datastore.path).with_context(|| {
        format!(
            "Failed to open datastore: {}",
            settings.datastore.path.display()
        )
    })?;

    let resolver = ConfigResolver::new(settings, Environment::capture());
    let factory = StorageFactory::new(resolver, datastore.clone());
    Ok(BlobService::new(MetadataStore::new(datastore), factory))
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

/// Print a failure and pick the exit code.
///
/// Blob errors are printed as JSON with their category; anything else goes
/// to stderr.
pub fn report_error(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<blobgate::Error>() {
        Some(blob_err) => {
            let body = serde_json::json!({
                "success": false,
                "error": blob_err.to_string(),
                "category": blob_err.category(),
                "status": blob_err.status_code(),
            });
            println!("{body:#}");
        },
        None => eprintln!("Error: {err:#}"),
    }
    ExitCode::FAILURE
}
