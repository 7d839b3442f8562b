//! Filesystem-backed storage backend.
//!
//! Content is written as raw bytes to `<storage_path>/<shard>/<id>.blob`,
//! where the shard is the first two characters of the identifier (`00` when
//! the identifier is empty). Sharding bounds the fan-out of any single
//! directory; shard directories are created on demand.

use super::backend::StorageBackend;
use super::error::{BackendError, BackendResult};
use super::options::BackendOptions;
use super::validation::{self, is_safe_path_component};
use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix of every content file.
const BLOB_SUFFIX: &str = "blob";
/// Shard used for identifiers with no characters.
const EMPTY_SHARD: &str = "00";
/// Default storage directory, relative to the working directory.
pub const DEFAULT_STORAGE_PATH: &str = "storage/blobs";

/// Filesystem-backed object storage backend.
///
/// # Thread Safety
///
/// `LocalBackend` is `Clone` and holds no mutable state; concurrent writers
/// to the same id race at the filesystem and the last write wins.
#[derive(Clone, Debug)]
pub struct LocalBackend {
    base_dir: PathBuf,
}

impl LocalBackend {
    /// Opens the backend at the given directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();

        fs::create_dir_all(&base_dir).map_err(|e| {
            Error::configuration(format!(
                "Failed to create storage directory {}: {e}",
                base_dir.display()
            ))
        })?;

        Ok(Self { base_dir })
    }

    /// Builds the backend from its option map (`storage_path`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the directory cannot be created.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        Self::open(options.string_or("storage_path", DEFAULT_STORAGE_PATH))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the filesystem path for a blob.
    ///
    /// # Errors
    ///
    /// Returns an `Invalid` error if the id cannot be used as a file name.
    pub fn file_path_for(&self, id: &str) -> BackendResult<PathBuf> {
        if !is_safe_path_component(id) {
            return Err(BackendError::invalid(format!(
                "blob id cannot be used as a file name: {id:?}"
            )));
        }

        // A shard of `.` or `..` would climb out of the base directory.
        let shard: String = id.chars().take(2).collect();
        let shard = match shard.as_str() {
            "" | "." | ".." => EMPTY_SHARD,
            other => other,
        };
        Ok(self
            .base_dir
            .join(shard)
            .join(format!("{id}.{BLOB_SUFFIX}")))
    }

    fn read(&self, id: &str) -> BackendResult<Vec<u8>> {
        let path = self.file_path_for(id)?;
        fs::read(&path).map_err(|e| log_io("retrieve", id, &e))
    }
}

fn log_io(operation: &str, id: &str, err: &io::Error) -> BackendError {
    if err.kind() != io::ErrorKind::NotFound {
        tracing::error!(backend = "local", blob_id = %id, error = %err, "Local file {operation} error");
    }
    BackendError::io(&format!("local {operation} {id}"), err)
}

impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn store(&self, id: &str, data: &str) -> BackendResult<()> {
        if !validation::is_decodable(data) {
            return Err(BackendError::invalid(format!("payload for {id} is not Base64")));
        }
        let bytes = validation::decode(data)
            .map_err(|e| BackendError::invalid(format!("payload for {id} is not Base64: {e}")))?;

        let path = self.file_path_for(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| log_io("store", id, &e))?;
        }

        fs::write(&path, bytes).map_err(|e| log_io("store", id, &e))
    }

    fn retrieve(&self, id: &str) -> BackendResult<String> {
        self.read(id).map(|bytes| validation::encode(&bytes))
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        let path = self.file_path_for(id)?;
        fs::remove_file(&path).map_err(|e| log_io("delete", id, &e))
    }

    fn exists(&self, id: &str) -> BackendResult<bool> {
        let path = self.file_path_for(id)?;
        Ok(path.is_file())
    }

    fn size(&self, id: &str) -> BackendResult<u64> {
        let path = self.file_path_for(id)?;
        fs::metadata(&path)
            .map(|meta| meta.len())
            .map_err(|e| log_io("size", id, &e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::BackendErrorKind;
    use tempfile::TempDir;

    fn create_backend() -> (LocalBackend, TempDir) {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::open(tmp.path().join("blobs")).unwrap();
        (backend, tmp)
    }

    #[test]
    fn test_store_and_retrieve() {
        let (backend, _tmp) = create_backend();

        backend.store("blob-1", "aGk=").unwrap();
        assert_eq!(backend.retrieve("blob-1").unwrap(), "aGk=");
    }

    #[test]
    fn test_stores_decoded_bytes_in_shard() {
        let (backend, _tmp) = create_backend();

        backend.store("blob-1", "aGk=").unwrap();

        let path = backend.base_dir().join("bl").join("blob-1.blob");
        assert_eq!(fs::read(path).unwrap(), b"hi");
    }

    #[test]
    fn test_single_character_id_uses_short_shard() {
        let (backend, _tmp) = create_backend();

        backend.store("x", "aGk=").unwrap();
        assert!(backend.base_dir().join("x").join("x.blob").is_file());
    }

    #[test]
    fn test_overwrite() {
        let (backend, _tmp) = create_backend();

        backend.store("blob-1", "b3JpZ2luYWw=").unwrap();
        backend.store("blob-1", "dXBkYXRlZA==").unwrap();
        assert_eq!(backend.retrieve("blob-1").unwrap(), "dXBkYXRlZA==");
        assert_eq!(backend.size("blob-1").unwrap(), 7);
    }

    #[test]
    fn test_retrieve_canonicalizes_wrapped_input() {
        let (backend, _tmp) = create_backend();

        backend.store("blob-1", "SGVsbG8s\nIFdvcmxk\nIQ==\n").unwrap();
        assert_eq!(backend.retrieve("blob-1").unwrap(), "SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_retrieve_missing() {
        let (backend, _tmp) = create_backend();
        assert!(backend.retrieve("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete() {
        let (backend, _tmp) = create_backend();

        backend.store("blob-1", "aGk=").unwrap();
        assert!(backend.exists("blob-1").unwrap());
        backend.delete("blob-1").unwrap();
        assert!(!backend.exists("blob-1").unwrap());
        assert!(backend.delete("blob-1").unwrap_err().is_not_found());
    }

    #[test]
    fn test_size() {
        let (backend, _tmp) = create_backend();

        backend.store("blob-1", "SGVsbG8sIFdvcmxkIQ==").unwrap();
        assert_eq!(backend.size("blob-1").unwrap(), 13);
        assert!(backend.size("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_rejects_invalid_payload() {
        let (backend, _tmp) = create_backend();

        let err = backend.store("blob-1", "").unwrap_err();
        assert_eq!(err.kind(), BackendErrorKind::Invalid);
        assert!(!backend.exists("blob-1").unwrap());
    }

    #[test]
    fn test_path_traversal_prevention() {
        let (backend, _tmp) = create_backend();

        let attack_ids = ["../etc/passwd", "a/../../b", "/etc/passwd", "..", "a\\b"];
        for id in &attack_ids {
            let result = backend.store(id, "aGk=");
            assert!(result.is_err(), "Path traversal not prevented for: {id}");
        }
    }

    #[test]
    fn test_dot_prefixed_ids_stay_inside_base_dir() {
        let (backend, tmp) = create_backend();

        backend.store("..evil", "aGk=").unwrap();
        backend.store(".x", "aGk=").unwrap();

        assert_eq!(
            backend.file_path_for("..evil").unwrap(),
            backend.base_dir().join("00").join("..evil.blob")
        );
        assert!(backend.base_dir().join(".x").join(".x.blob").is_file());
        assert!(!tmp.path().join("..evil.blob").exists());
        assert_eq!(backend.retrieve("..evil").unwrap(), "aGk=");
    }

    proptest::proptest! {
        #[test]
        fn test_blob_paths_are_two_levels_below_base_dir(id in "[.a-z0-9_-]{1,12}") {
            let (backend, _tmp) = create_backend();
            proptest::prop_assume!(is_safe_path_component(&id));

            let path = backend.file_path_for(&id).unwrap();
            let shard_dir = path.parent().unwrap();
            proptest::prop_assert_eq!(shard_dir.parent().unwrap(), backend.base_dir());
            proptest::prop_assert!(shard_dir.file_name().is_some());
            proptest::prop_assert!(
                path.components().all(|c| !matches!(c, std::path::Component::ParentDir))
            );
        }
    }

    #[test]
    fn test_store_fails_when_shard_is_a_file() {
        let (backend, _tmp) = create_backend();

        fs::write(backend.base_dir().join("ab"), b"not a directory").unwrap();
        let err = backend.store("abc", "aGk=").unwrap_err();
        assert_ne!(err.kind(), BackendErrorKind::Invalid);
    }

    #[test]
    fn test_from_options() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("configured");
        let options = BackendOptions::new().with("storage_path", dir.display().to_string());

        let backend = LocalBackend::from_options(&options).unwrap();
        assert_eq!(backend.base_dir(), dir.as_path());
        assert!(dir.is_dir());
    }
}
