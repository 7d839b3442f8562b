//! End-to-end blob lifecycle against file-backed datastores.

use crate::support::service_with;
use blobgate::Error;
use blobgate::config::Settings;
use blobgate::services::datastore::Datastore;
use blobgate::services::storage::validation;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_create_get_delete_on_local_backend() {
    let tmp = TempDir::new().unwrap();
    let blobs = tmp.path().join("blobs");
    let blobs = blobs.display().to_string();
    let datastore = Datastore::open(tmp.path().join("meta.sqlite3")).unwrap();
    let service = service_with(
        &datastore,
        Settings::default(),
        &[("STORAGE_BACKEND", "local"), ("LOCAL_STORAGE_PATH", blobs.as_str())],
    );

    let record = service.create("report-2024", "SGVsbG8sIFdvcmxkIQ==", None).unwrap();
    assert_eq!(record.size, 13);
    assert_eq!(record.backend, "local");

    let blob = service.get("report-2024").unwrap();
    assert_eq!(blob.data, "SGVsbG8sIFdvcmxkIQ==");
    assert_eq!(validation::decode(&blob.data).unwrap(), b"Hello, World!");

    let err = service.create("report-2024", "aGk=", None).unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    service.delete("report-2024").unwrap();
    assert!(matches!(service.get("report-2024"), Err(Error::NotFound { .. })));
    assert!(matches!(service.delete("report-2024"), Err(Error::NotFound { .. })));
}

#[test]
fn test_records_keep_their_backend_across_restarts() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("meta.sqlite3");
    let blobs = tmp.path().join("blobs").display().to_string();

    {
        let datastore = Datastore::open(&db_path).unwrap();
        let service = service_with(
            &datastore,
            Settings::default(),
            &[("STORAGE_BACKEND", "local"), ("LOCAL_STORAGE_PATH", blobs.as_str())],
        );
        service.create("pinned", "aGk=", None).unwrap();
    }

    // New process, new default.
    let datastore = Datastore::open(&db_path).unwrap();
    let service = service_with(
        &datastore,
        Settings::default(),
        &[("STORAGE_BACKEND", "database"), ("LOCAL_STORAGE_PATH", blobs.as_str())],
    );

    let blob = service.get("pinned").unwrap();
    assert_eq!(blob.record.backend, "local");
    assert_eq!(blob.data, "aGk=");

    let fresh = service.create("fresh", "aGk=", None).unwrap();
    assert_eq!(fresh.backend, "database");

    let page = service.list(1, 10).unwrap();
    assert_eq!(page.total_count, 2);
}

#[test]
fn test_backend_options_from_config_file() {
    let tmp = TempDir::new().unwrap();
    let blobs = tmp.path().join("from-config");
    let config_path = tmp.path().join("blobgate.toml");
    fs::write(
        &config_path,
        format!(
            "default_backend = \"local\"\n\n[backends.local]\nstorage_path = {:?}\n",
            blobs.display().to_string()
        ),
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    let datastore = Datastore::open(tmp.path().join("meta.sqlite3")).unwrap();
    let service = service_with(&datastore, settings, &[]);

    let record = service.create("configured", "aGk=", None).unwrap();
    assert_eq!(record.backend, "local");
    assert!(fs::read_dir(&blobs).unwrap().next().is_some());
}

#[test]
fn test_failed_store_leaves_no_record() {
    let tmp = TempDir::new().unwrap();
    // A file where the storage directory should be.
    let blocked = tmp.path().join("blocked");
    fs::write(&blocked, b"not a directory").unwrap();
    let blocked = blocked.display().to_string();

    let datastore = Datastore::open(tmp.path().join("meta.sqlite3")).unwrap();
    let service = service_with(
        &datastore,
        Settings::default(),
        &[("LOCAL_STORAGE_PATH", blocked.as_str())],
    );

    let err = service.create("orphan", "aGk=", Some("local")).unwrap_err();
    assert!(matches!(err, Error::Configuration(_) | Error::Backend { .. }), "{err:?}");
    assert!(!service.metadata().exists("orphan").unwrap());
}

#[test]
fn test_audit_reports_content_removed_out_of_band() {
    let tmp = TempDir::new().unwrap();
    let blobs_dir = tmp.path().join("blobs");
    let blobs = blobs_dir.display().to_string();
    let datastore = Datastore::open(tmp.path().join("meta.sqlite3")).unwrap();
    let service = service_with(
        &datastore,
        Settings::default(),
        &[("LOCAL_STORAGE_PATH", blobs.as_str())],
    );

    service.create("kept", "aGk=", Some("local")).unwrap();
    service.create("lost", "aGk=", Some("local")).unwrap();
    assert!(service.audit().unwrap().is_empty());

    fs::remove_dir_all(&blobs_dir).unwrap();
    let findings = service.audit().unwrap();
    assert_eq!(findings.len(), 2);

    // Audit only reports.
    assert_eq!(service.list(1, 10).unwrap().total_count, 2);
}
