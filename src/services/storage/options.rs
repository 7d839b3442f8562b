//! Per-backend option maps.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Keys whose values are never displayed.
const SECRET_KEYS: [&str; 2] = ["password", "secret_key"];

/// A flat, normalized configuration map for one backend.
///
/// Keys are trimmed, lower-cased and use `_` instead of `-`, so `Access-Key`,
/// `access_key` and ` ACCESS_KEY ` all address the same entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BackendOptions {
    entries: BTreeMap<String, String>,
}

impl BackendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes an option key.
    pub fn normalize_key(key: &str) -> String {
        key.trim().to_ascii_lowercase().replace('-', "_")
    }

    /// Sets an option, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.entries
            .insert(Self::normalize_key(key), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns a trimmed, non-empty value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&Self::normalize_key(key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Layers `self` over `fallback`: keys present here win.
    #[must_use]
    pub fn merged_over(&self, fallback: &Self) -> Self {
        let mut entries = fallback.entries.clone();
        for (key, value) in &self.entries {
            entries.insert(key.clone(), value.clone());
        }
        Self { entries }
    }

    /// Returns a value or a configuration error naming the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the key is missing or blank.
    pub fn required(&self, backend: &str, key: &str) -> Result<String> {
        self.get(key).map(str::to_string).ok_or_else(|| {
            Error::configuration(format!(
                "{backend} configuration missing required setting '{key}'"
            ))
        })
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    /// Parses a port number, using `default` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value is not a valid port.
    pub fn port_or(&self, backend: &str, key: &str, default: u16) -> Result<u16> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<u16>().ok().filter(|p| *p > 0).ok_or_else(|| {
                Error::configuration(format!("{backend} setting '{key}' is not a valid port: {raw}"))
            }),
        }
    }

    /// Reads a boolean flag. Only an explicit `false`/`0`/`no`/`off` turns it off.
    pub fn flag_or(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            Some("false" | "0" | "no" | "off") => false,
            Some(_) => true,
            None => default,
        }
    }

    /// Copy with secret values masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let entries = self
            .entries
            .iter()
            .map(|(key, value)| {
                let value = if SECRET_KEYS.contains(&key.as_str()) {
                    "********".to_string()
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect();
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for BackendOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (key, value) in iter {
            options.set(key.as_ref(), value);
        }
        options
    }
}
