//! S3-compatible storage backend.
//!
//! Talks plain HTTP to any S3-compatible endpoint with path-style addressing:
//! objects live at `/<bucket>/blobs/<id>`. Requests are signed with
//! [`sigv4`]; success is judged by status class alone.
//!
//! Store, retrieve, delete, exists and size map to PUT, GET, DELETE, HEAD and
//! HEAD. No multipart uploads, no range reads, no retries.

pub mod sigv4;

use super::backend::StorageBackend;
use super::error::{BackendError, BackendErrorKind, BackendResult};
use super::options::BackendOptions;
use super::validation;
use crate::error::{Error, Result};
use chrono::Utc;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sigv4::{SignedRequest, Signer};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_REGION: &str = "us-east-1";
/// Prefix of every object key.
pub const KEY_PREFIX: &str = "blobs";

/// HTTP connect timeout
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Characters left alone in object key segments: `A-Z a-z 0-9 - . _ ~`.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Default endpoint for a region.
pub fn default_endpoint(region: &str) -> String {
    format!("https://s3.{region}.amazonaws.com")
}

/// Connection settings for the S3 backend.
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint: Url,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint.as_str())
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .finish()
    }
}

impl S3Settings {
    /// Reads `bucket`, `access_key`, `secret_key` (required) and `endpoint`,
    /// `region` (optional).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a required field is missing or the
    /// endpoint is not an `http(s)` URL.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        let bucket = options.required("s3", "bucket")?;
        let access_key = options.required("s3", "access_key")?;
        let secret_key = options.required("s3", "secret_key")?;
        let region = options.string_or("region", DEFAULT_REGION);
        let endpoint = options
            .get("endpoint")
            .map_or_else(|| default_endpoint(&region), str::to_string);

        Ok(Self {
            endpoint: parse_endpoint(&endpoint)?,
            bucket,
            access_key,
            secret_key,
            region,
        })
    }

    /// Value of the `Host` header: host, plus port when it is not the default.
    pub fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Canonical (already encoded) URI of an object.
    pub fn object_uri(&self, id: &str) -> String {
        let prefix = self.endpoint.path().trim_end_matches('/');
        format!(
            "{prefix}/{}/{KEY_PREFIX}/{}",
            utf8_percent_encode(&self.bucket, KEY_SEGMENT),
            utf8_percent_encode(id, KEY_SEGMENT)
        )
    }

    fn object_url(&self, uri: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(uri);
        url.set_query(None);
        url
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::configuration(format!("s3 endpoint is not a valid URL ({raw}): {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(Error::configuration(format!(
            "s3 endpoint must be an http(s) URL with a host: {raw}"
        )));
    }
    Ok(url)
}

fn map_http_error(operation: &str, id: &str, err: ureq::Error) -> BackendError {
    let error = match err {
        ureq::Error::Io(io) => BackendError::io(&format!("s3 {operation} {id}"), &io),
        ureq::Error::Timeout(_) => BackendError::new(
            BackendErrorKind::Transient,
            format!("s3 {operation} {id}: {err}"),
        ),
        other => BackendError::protocol(format!("s3 {operation} {id}: {other}")),
    };
    tracing::error!(backend = "s3", blob_id = %id, error = %error, "S3 {operation} error");
    error
}

fn status_error(operation: &str, id: &str, status: u16) -> BackendError {
    let message = format!("s3 {operation} {id}: HTTP {status}");
    let error = match status {
        404 => BackendError::not_found(message),
        401 | 403 => BackendError::permission(message),
        500..=599 => BackendError::new(BackendErrorKind::Transient, message),
        _ => BackendError::protocol(message),
    };
    if !error.is_not_found() {
        tracing::error!(backend = "s3", blob_id = %id, status, "S3 {operation} rejected");
    }
    error
}

fn with_signed_headers<B>(
    mut request: ureq::RequestBuilder<B>,
    signed: &SignedRequest,
) -> ureq::RequestBuilder<B> {
    // ureq derives Host from the URL; it matches the signed value.
    for (name, value) in signed.headers.iter().filter(|(n, _)| n != "host") {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

#[derive(Clone, Copy)]
enum Verb {
    Put,
    Get,
    Delete,
    Head,
}

impl Verb {
    const fn method(self) -> &'static str {
        match self {
            Self::Put => "PUT",
            Self::Get => "GET",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

type Response = ureq::http::Response<ureq::Body>;

/// S3-compatible storage backend.
pub struct S3Backend {
    settings: S3Settings,
    signer: Signer,
    agent: ureq::Agent,
}

impl S3Backend {
    pub fn new(settings: S3Settings) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build();
        let signer = Signer::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            settings.region.clone(),
        );

        Self {
            settings,
            signer,
            agent: config.into(),
        }
    }

    /// # Errors
    ///
    /// Returns a configuration error if bucket or keys are missing.
    pub fn from_options(options: &BackendOptions) -> Result<Self> {
        Ok(Self::new(S3Settings::from_options(options)?))
    }

    pub fn settings(&self) -> &S3Settings {
        &self.settings
    }

    fn send(&self, verb: Verb, id: &str, body: Option<&[u8]>) -> BackendResult<Response> {
        let uri = self.settings.object_uri(id);
        let url = self.settings.object_url(&uri);
        let signed = self
            .signer
            .sign(verb.method(), &self.settings.host(), &uri, body, Utc::now());

        tracing::debug!(backend = "s3", method = verb.method(), url = %url, "S3 request");

        let url = url.as_str();
        let result = match verb {
            Verb::Put => with_signed_headers(self.agent.put(url), &signed).send(body.unwrap_or_default()),
            Verb::Get => with_signed_headers(self.agent.get(url), &signed).call(),
            Verb::Delete => with_signed_headers(self.agent.delete(url), &signed).call(),
            Verb::Head => with_signed_headers(self.agent.head(url), &signed).call(),
        };

        result.map_err(|e| map_http_error(verb.method(), id, e))
    }

    fn send_ok(&self, verb: Verb, id: &str, body: Option<&[u8]>) -> BackendResult<Response> {
        let response = self.send(verb, id, body)?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(status_error(verb.method(), id, status.as_u16()))
        }
    }
}

impl StorageBackend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn store(&self, id: &str, data: &str) -> BackendResult<()> {
        if !validation::is_decodable(data) {
            return Err(BackendError::invalid(format!("payload for {id} is not Base64")));
        }
        let bytes = validation::decode(data)
            .map_err(|e| BackendError::invalid(format!("payload for {id} is not Base64: {e}")))?;

        self.send_ok(Verb::Put, id, Some(&bytes)).map(|_| ())
    }

    fn retrieve(&self, id: &str) -> BackendResult<String> {
        let response = self.send_ok(Verb::Get, id, None)?;
        let bytes = response
            .into_body()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| map_http_error("GET", id, e))?;
        Ok(validation::encode(&bytes))
    }

    fn delete(&self, id: &str) -> BackendResult<()> {
        self.send_ok(Verb::Delete, id, None).map(|_| ())
    }

    fn exists(&self, id: &str) -> BackendResult<bool> {
        match self.send_ok(Verb::Head, id, None) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn size(&self, id: &str) -> BackendResult<u64> {
        let response = self.send_ok(Verb::Head, id, None)?;
        response
            .headers()
            .get("content-length")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .ok_or_else(|| BackendError::protocol(format!("s3 HEAD {id}: missing content-length")))
    }
}
