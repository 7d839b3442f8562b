//! Configuration for the blob gateway.
//!
//! Configuration is resolved once at startup into immutable values:
//!
//! - [`Settings`] - stored defaults loaded from `blobgate.toml`
//! - [`Environment`] - a snapshot of the relevant environment variables
//! - [`ConfigResolver`] - per-backend option maps built from both
//!
//! Per backend, the precedence is: explicit options passed by the caller,
//! then environment overrides, then stored defaults, then built-in fallbacks.

use crate::error::Result;
use crate::logging::LogFormat;
use crate::services::storage::{BackendKind, BackendOptions, ftp, local, s3};
use anyhow::Context;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "blobgate.toml";
/// Default location of the metadata database.
pub const DEFAULT_DATASTORE_PATH: &str = "storage/blobgate.sqlite3";

/// Environment variables the resolver reads.
pub const ENV_VARS: [&str; 13] = [
    "STORAGE_BACKEND",
    "S3_ENDPOINT",
    "S3_BUCKET",
    "S3_ACCESS_KEY",
    "S3_SECRET_KEY",
    "S3_REGION",
    "FTP_HOST",
    "FTP_USERNAME",
    "FTP_PASSWORD",
    "FTP_PORT",
    "FTP_REMOTE_PATH",
    "FTP_PASSIVE",
    "LOCAL_STORAGE_PATH",
];

/// blobgate.toml structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend used for new blobs when the caller names none.
    pub default_backend: Option<String>,
    pub datastore: DatastoreSettings,
    pub logging: LoggingSettings,
    /// `[backends.<name>]` tables of scalar options.
    pub backends: BTreeMap<String, BTreeMap<String, toml::Value>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatastoreSettings {
    pub path: PathBuf,
}

impl Default for DatastoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATASTORE_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
}

impl Settings {
    /// Load settings from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this structure.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Loads an explicit file, or `blobgate.toml` if present, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a file that should be used cannot be loaded.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load_from(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Stored options for one backend, values rendered as strings.
    pub fn stored_options(&self, backend: &str) -> BackendOptions {
        let Some(table) = self.backends.get(backend) else {
            return BackendOptions::new();
        };

        table
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    other => {
                        tracing::warn!(backend, key = %key, kind = other.type_str(), "Ignoring non-scalar backend option");
                        return None;
                    },
                };
                Some((key.clone(), value))
            })
            .collect()
    }
}

/// Snapshot of the environment variables in [`ENV_VARS`].
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Reads the process environment.
    pub fn capture() -> Self {
        ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (*name, value)))
            .collect()
    }

    /// Trimmed, non-empty value of a variable.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Builds backend option maps from settings and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    settings: Settings,
    env: Environment,
}

impl ConfigResolver {
    pub fn new(settings: Settings, env: Environment) -> Self {
        Self { settings, env }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// `STORAGE_BACKEND`, then `default_backend`, then `local`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the chosen name is not registered.
    pub fn default_backend(&self) -> Result<BackendKind> {
        self.env
            .get("STORAGE_BACKEND")
            .or(self.settings.default_backend.as_deref())
            .unwrap_or(BackendKind::Local.as_str())
            .parse()
    }

    /// Environment value, else stored value.
    fn pick<'a>(&'a self, var: &str, stored: &'a BackendOptions, key: &str) -> Option<&'a str> {
        self.env.get(var).or_else(|| stored.get(key))
    }

    /// Options for `kind` from environment, stored defaults and fallbacks.
    pub fn options_for(&self, kind: BackendKind) -> BackendOptions {
        let stored = self.settings.stored_options(kind.as_str());
        let mut options = BackendOptions::new();

        match kind {
            BackendKind::Database => {},
            BackendKind::Local => {
                let path = self
                    .pick("LOCAL_STORAGE_PATH", &stored, "storage_path")
                    .unwrap_or(local::DEFAULT_STORAGE_PATH);
                options.set("storage_path", path);
            },
            BackendKind::Ftp => {
                for (var, key) in [
                    ("FTP_HOST", "host"),
                    ("FTP_USERNAME", "username"),
                    ("FTP_PASSWORD", "password"),
                ] {
                    if let Some(value) = self.pick(var, &stored, key) {
                        options.set(key, value);
                    }
                }
                let port = self
                    .pick("FTP_PORT", &stored, "port")
                    .map_or_else(|| ftp::DEFAULT_PORT.to_string(), str::to_string);
                options.set("port", port);
                options.set(
                    "remote_path",
                    self.pick("FTP_REMOTE_PATH", &stored, "remote_path")
                        .unwrap_or(ftp::DEFAULT_REMOTE_PATH),
                );
                let passive = self.env.get("FTP_PASSIVE") != Some("false")
                    && stored.flag_or("passive", true);
                options.set("passive", passive.to_string());
            },
            BackendKind::S3 => {
                let region = self
                    .pick("S3_REGION", &stored, "region")
                    .unwrap_or(s3::DEFAULT_REGION)
                    .to_string();
                let endpoint = self
                    .pick("S3_ENDPOINT", &stored, "endpoint")
                    .map_or_else(|| s3::default_endpoint(&region), str::to_string);
                for (var, key) in [
                    ("S3_BUCKET", "bucket"),
                    ("S3_ACCESS_KEY", "access_key"),
                    ("S3_SECRET_KEY", "secret_key"),
                ] {
                    if let Some(value) = self.pick(var, &stored, key) {
                        options.set(key, value);
                    }
                }
                options.set("endpoint", endpoint);
                options.set("region", region);
            },
        }

        options
    }

    /// Explicit options layered over [`options_for`](Self::options_for).
    pub fn resolve(&self, kind: BackendKind, explicit: Option<&BackendOptions>) -> BackendOptions {
        let resolved = self.options_for(kind);
        match explicit {
            Some(explicit) => explicit.merged_over(&resolved),
            None => resolved,
        }
    }
}
