//! Operator commands: `blobgate backend` and `blobgate audit`.

use anyhow::Result;
use blobgate::config::{ConfigResolver, Environment, Settings};
use blobgate::services::storage::BackendKind;
use serde_json::json;

use super::{open_service, print_json};

/// Shows the default backend and the options every backend resolves to.
/// Secrets are masked.
pub fn backend(settings: Settings) -> Result<()> {
    let resolver = ConfigResolver::new(settings, Environment::capture());
    let default = resolver.default_backend()?;

    let backends: serde_json::Map<String, serde_json::Value> = BackendKind::ALL
        .into_iter()
        .map(|kind| {
            let options = resolver.options_for(kind).redacted();
            (kind.to_string(), json!(options))
        })
        .collect();

    print_json(&json!({
        "default_backend": default,
        "backends": backends,
    }))
}

/// Lists records whose content is missing or whose backend is unreachable.
pub fn audit(settings: Settings) -> Result<()> {
    let service = open_service(settings)?;
    let findings = service.audit()?;

    print_json(&json!({
        "success": true,
        "inconsistent": findings.len(),
        "findings": findings,
    }))
}
