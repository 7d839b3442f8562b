//! Blob commands.
//!
//! - `blobgate put <id> --data <b64> [--backend <name>]`
//! - `blobgate put <id> --file <path>` - raw bytes, encoded before storing
//! - `blobgate get <id> [--output <path>]`
//! - `blobgate delete <id>`
//! - `blobgate list [--page N] [--per-page N]`

use anyhow::{Context, Result};
use blobgate::config::Settings;
use blobgate::services::storage::validation;
use serde_json::json;
use std::fs;
use std::path::PathBuf;

use super::{open_service, print_json};

pub fn put(
    settings: Settings,
    id: &str,
    data: Option<String>,
    file: Option<PathBuf>,
    backend: Option<&str>,
) -> Result<()> {
    let data = match (data, file) {
        (Some(data), _) => data,
        (None, Some(path)) => {
            let bytes =
                fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            validation::encode(&bytes)
        },
        (None, None) => anyhow::bail!("Either --data or --file is required"),
    };

    let service = open_service(settings)?;
    let record = service.create(id, &data, backend)?;
    print_json(&json!({ "success": true, "blob": record }))
}

pub fn get(settings: Settings, id: &str, output: Option<PathBuf>) -> Result<()> {
    let service = open_service(settings)?;
    let blob = service.get(id)?;

    match output {
        Some(path) => {
            let bytes = validation::decode(&blob.data).context("Stored content is not Base64")?;
            fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_json(&json!({
                "success": true,
                "blob": blob.record,
                "written_to": path.display().to_string(),
            }))
        },
        None => print_json(&json!({ "success": true, "blob": blob })),
    }
}

pub fn delete(settings: Settings, id: &str) -> Result<()> {
    let service = open_service(settings)?;
    service.delete(id)?;
    print_json(&json!({ "success": true }))
}

pub fn list(settings: Settings, page: u32, per_page: u32) -> Result<()> {
    let service = open_service(settings)?;
    let page = service.list(page, per_page)?;
    print_json(&page)
}
