//! Property-based tests for payload handling.
//!
//! # Tested Invariants
//!
//! - Canonical Base64 of any non-empty byte string is accepted
//! - Whatever the validator accepts, the lenient decoder decodes
//! - Content read back from a backend equals what was stored
//! - Recorded size equals the decoded payload length

use crate::support::service_with;
use blobgate::config::Settings;
use blobgate::services::datastore::Datastore;
use blobgate::services::storage::{DatabaseBackend, LocalBackend, StorageBackend, validation};
use proptest::prelude::*;
use tempfile::TempDir;

fn blob_id() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_-]{0,30}"
}

proptest! {
    #[test]
    fn test_canonical_encodings_are_accepted(bytes in proptest::collection::vec(any::<u8>(), 1..512)) {
        let encoded = validation::encode(&bytes);
        prop_assert!(validation::is_canonical_base64(&encoded));
        prop_assert_eq!(validation::decoded_len(&encoded), Some(bytes.len() as u64));
    }

    #[test]
    fn test_accepted_payloads_decode(data in "[A-Za-z0-9+/=]{0,64}") {
        if validation::is_canonical_base64(&data) {
            prop_assert!(validation::is_decodable(&data));
        }
    }

    #[test]
    fn test_unpadded_encodings_are_rejected(bytes in proptest::collection::vec(any::<u8>(), 1..128)) {
        prop_assume!(bytes.len() % 3 != 0);
        let encoded = validation::encode(&bytes);
        let unpadded = encoded.trim_end_matches('=');
        prop_assert!(!validation::is_canonical_base64(unpadded));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn test_database_backend_returns_what_it_stored(
        id in blob_id(),
        bytes in proptest::collection::vec(any::<u8>(), 1..2048),
    ) {
        let backend = DatabaseBackend::new(Datastore::memory().unwrap());
        let encoded = validation::encode(&bytes);

        backend.store(&id, &encoded).unwrap();
        prop_assert_eq!(backend.retrieve(&id).unwrap(), encoded);
        prop_assert_eq!(backend.size(&id).unwrap(), bytes.len() as u64);
    }

    #[test]
    fn test_local_backend_returns_what_it_stored(
        id in blob_id(),
        bytes in proptest::collection::vec(any::<u8>(), 1..2048),
    ) {
        let tmp = TempDir::new().unwrap();
        let backend = LocalBackend::open(tmp.path()).unwrap();
        let encoded = validation::encode(&bytes);

        backend.store(&id, &encoded).unwrap();
        prop_assert_eq!(backend.retrieve(&id).unwrap(), encoded);
        prop_assert_eq!(backend.size(&id).unwrap(), bytes.len() as u64);
        backend.delete(&id).unwrap();
        prop_assert!(!backend.exists(&id).unwrap());
    }

    #[test]
    fn test_recorded_size_is_decoded_length(bytes in proptest::collection::vec(any::<u8>(), 1..1024)) {
        let datastore = Datastore::memory().unwrap();
        let service = service_with(&datastore, Settings::default(), &[("STORAGE_BACKEND", "database")]);
        let encoded = validation::encode(&bytes);

        let record = service.create("sized", &encoded, None).unwrap();
        prop_assert_eq!(record.size, bytes.len() as u64);
        prop_assert_eq!(service.get("sized").unwrap().data, encoded);
    }
}
