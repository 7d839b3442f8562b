//! Shared helpers: service builders and a fake S3 endpoint.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use blobgate::BlobService;
use blobgate::config::{ConfigResolver, Environment, Settings};
use blobgate::services::datastore::Datastore;
use blobgate::services::metadata::MetadataStore;
use blobgate::services::storage::StorageFactory;
use blobgate::services::storage::s3::sigv4;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;

pub const ACCESS_KEY: &str = "AKIDEXAMPLE";
pub const SECRET_KEY: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";
pub const BUCKET: &str = "media";
pub const REGION: &str = "us-east-1";

/// Builds a service over `datastore` with the given environment and settings.
pub fn service_with(
    datastore: &Datastore,
    settings: Settings,
    env: &[(&str, &str)],
) -> BlobService {
    let env: Environment = env.iter().copied().collect();
    let factory = StorageFactory::new(ConfigResolver::new(settings, env), datastore.clone());
    BlobService::new(MetadataStore::new(datastore.clone()), factory)
}

/// A request as seen by [`FakeS3`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub signature_valid: bool,
}

#[derive(Default)]
struct Shared {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    forced_status: AtomicU16,
}

/// Minimal path-style S3 endpoint on a loopback port.
///
/// Serves PUT/GET/HEAD/DELETE on object paths from an axum router running on
/// its own thread. Requests without a SigV4 `Authorization` header are
/// rejected with 403. Every request's signature is recomputed and recorded.
pub struct FakeS3 {
    port: u16,
    shared: Arc<Shared>,
}

impl FakeS3 {
    pub fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared::default());

        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&shared));
        thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self { port, shared }
    }

    pub fn endpoint(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Environment that points the s3 backend at this server.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        vec![
            ("S3_ENDPOINT", self.endpoint()),
            ("S3_BUCKET", BUCKET.to_string()),
            ("S3_ACCESS_KEY", ACCESS_KEY.to_string()),
            ("S3_SECRET_KEY", SECRET_KEY.to_string()),
            ("S3_REGION", REGION.to_string()),
        ]
    }

    /// Answer every request with this status (0 restores normal behavior).
    pub fn force_status(&self, status: u16) {
        self.shared.forced_status.store(status, Ordering::SeqCst);
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.shared.objects.lock().get(path).cloned()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.shared.requests.lock().clone()
    }
}

fn verify_signature(method: &str, path: &str, headers: &HashMap<String, String>) -> bool {
    let Some(auth) = headers.get("authorization") else {
        return false;
    };
    let Some(rest) = auth.strip_prefix("AWS4-HMAC-SHA256 ") else {
        return false;
    };

    let fields: HashMap<&str, &str> = rest
        .split(", ")
        .filter_map(|part| part.split_once('='))
        .collect();
    let (Some(credential), Some(signed), Some(signature)) = (
        fields.get("Credential"),
        fields.get("SignedHeaders"),
        fields.get("Signature"),
    ) else {
        return false;
    };

    let scope_parts: Vec<&str> = credential.splitn(2, '/').collect();
    let [_, scope] = scope_parts.as_slice() else {
        return false;
    };
    let scope_fields: Vec<&str> = scope.split('/').collect();
    let [date, region, service, _] = scope_fields.as_slice() else {
        return false;
    };

    let signed_values: Vec<(&str, &str)> = signed
        .split(';')
        .map(|name| (name, headers.get(name).map_or("", String::as_str)))
        .collect();
    let payload_hash = headers
        .get("x-amz-content-sha256")
        .map_or(sigv4::UNSIGNED_PAYLOAD, String::as_str);
    let timestamp = headers.get("x-amz-date").map_or("", String::as_str);

    let request = sigv4::canonical_request(method, path, "", &signed_values, payload_hash);
    let to_sign = sigv4::string_to_sign(timestamp, scope, &request);
    let key = sigv4::derive_signing_key(SECRET_KEY, date, region, service);
    sigv4::signature(&key, &to_sign) == *signature
}

async fn handle(
    State(shared): State<Arc<Shared>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_string(), value.to_string()))
        })
        .collect();

    let signature_valid = verify_signature(method.as_str(), &path, &headers);
    let authorized = headers
        .get("authorization")
        .is_some_and(|a| a.starts_with("AWS4-HMAC-SHA256 Credential="));
    shared.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: path.clone(),
        headers,
        signature_valid,
    });

    let forced = shared.forced_status.load(Ordering::SeqCst);
    if forced != 0 {
        return StatusCode::from_u16(forced)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response();
    }
    if !authorized {
        return StatusCode::FORBIDDEN.into_response();
    }

    let mut objects = shared.objects.lock();
    match method {
        Method::PUT => {
            objects.insert(path, body.to_vec());
            StatusCode::OK.into_response()
        },
        // HEAD responses keep the length header; hyper drops the body.
        Method::GET | Method::HEAD => match objects.get(&path) {
            Some(data) => (StatusCode::OK, data.clone()).into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        Method::DELETE => match objects.remove(&path) {
            Some(_) => StatusCode::NO_CONTENT.into_response(),
            None => StatusCode::NOT_FOUND.into_response(),
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}
