//! S3 backend against a loopback endpoint.

use crate::support::{BUCKET, FakeS3, service_with};
use blobgate::config::Settings;
use blobgate::services::datastore::Datastore;
use blobgate::services::storage::{BackendOptions, S3Backend, StorageBackend};
use blobgate::{BlobService, Error};

fn s3_service(server: &FakeS3) -> BlobService {
    let env = server.env();
    let env: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();
    let datastore = Datastore::memory().unwrap();
    service_with(&datastore, Settings::default(), &env)
}

fn backend(server: &FakeS3) -> S3Backend {
    let options: BackendOptions = server
        .env()
        .into_iter()
        .map(|(name, value)| {
            let key = name.trim_start_matches("S3_").to_ascii_lowercase();
            (key, value)
        })
        .collect();
    S3Backend::from_options(&options).unwrap()
}

#[test]
fn test_lifecycle_through_service() {
    let server = FakeS3::start();
    let service = s3_service(&server);
    let path = format!("/{BUCKET}/blobs/report-2024");

    let record = service
        .create("report-2024", "SGVsbG8sIFdvcmxkIQ==", Some("s3"))
        .unwrap();
    assert_eq!(record.backend, "s3");
    assert_eq!(server.object(&path).unwrap(), b"Hello, World!");

    let blob = service.get("report-2024").unwrap();
    assert_eq!(blob.data, "SGVsbG8sIFdvcmxkIQ==");
    assert!(service.exists("report-2024").unwrap());
    assert_eq!(service.size("report-2024").unwrap(), Some(13));

    service.delete("report-2024").unwrap();
    assert!(server.object(&path).is_none());
    assert!(!service.exists("report-2024").unwrap());
}

#[test]
fn test_requests_carry_valid_signatures() {
    let server = FakeS3::start();
    let backend = backend(&server);

    backend.store("signed", "aGk=").unwrap();
    backend.retrieve("signed").unwrap();
    backend.exists("signed").unwrap();
    backend.delete("signed").unwrap();

    let requests = server.requests();
    let methods: Vec<&str> = requests.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, ["PUT", "GET", "HEAD", "DELETE"]);
    for request in &requests {
        assert!(request.signature_valid, "{} {}", request.method, request.path);
        assert!(request.headers.contains_key("x-amz-date"));
        assert!(request.headers.contains_key("x-amz-content-sha256"));
    }
    assert_eq!(
        requests[0].headers["x-amz-content-sha256"],
        "8f434346648f6b96df89dda901c5176b10a6d83961dd3c1ac88b59b2dc327aa4"
    );
}

#[test]
fn test_ids_are_percent_encoded() {
    let server = FakeS3::start();
    let backend = backend(&server);

    backend.store("quarterly report#1", "aGk=").unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].path, format!("/{BUCKET}/blobs/quarterly%20report%231"));
    assert!(requests[0].signature_valid);
    assert_eq!(backend.retrieve("quarterly report#1").unwrap(), "aGk=");
}

#[test]
fn test_missing_object() {
    let server = FakeS3::start();
    let backend = backend(&server);

    assert!(!backend.exists("absent").unwrap());
    assert!(backend.retrieve("absent").unwrap_err().is_not_found());
    assert!(backend.size("absent").unwrap_err().is_not_found());
}

#[test]
fn test_server_errors_compensate_create() {
    let server = FakeS3::start();
    let service = s3_service(&server);
    server.force_status(503);

    let err = service.create("unlucky", "aGk=", Some("s3")).unwrap_err();
    assert!(
        matches!(&err, Error::Backend { backend, operation } if backend == "s3" && *operation == "store")
    );
    assert!(!service.metadata().exists("unlucky").unwrap());

    // No retries for s3.
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn test_rejected_credentials_are_permission_errors() {
    let server = FakeS3::start();
    let backend = backend(&server);
    server.force_status(403);

    let err = backend.store("denied", "aGk=").unwrap_err();
    assert!(!err.is_transient());
    assert!(!err.is_not_found());
}

#[test]
fn test_failed_get_keeps_record() {
    let server = FakeS3::start();
    let service = s3_service(&server);
    service.create("kept", "aGk=", Some("s3")).unwrap();

    server.force_status(500);
    let err = service.get("kept").unwrap_err();
    assert!(matches!(err, Error::Backend { .. }));
    assert!(service.metadata().exists("kept").unwrap());

    server.force_status(0);
    assert_eq!(service.get("kept").unwrap().data, "aGk=");
}

#[test]
fn test_unreachable_endpoint_leaves_no_record() {
    // Bind then drop to get a port nothing listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let endpoint = format!("http://127.0.0.1:{port}");
    let datastore = Datastore::memory().unwrap();
    let service = service_with(
        &datastore,
        Settings::default(),
        &[
            ("S3_ENDPOINT", endpoint.as_str()),
            ("S3_BUCKET", BUCKET),
            ("S3_ACCESS_KEY", "AKID"),
            ("S3_SECRET_KEY", "SECRET"),
        ],
    );

    let err = service.create("nowhere", "aGk=", Some("s3")).unwrap_err();
    assert!(matches!(err, Error::Backend { .. }));
    assert!(!service.metadata().exists("nowhere").unwrap());
}
