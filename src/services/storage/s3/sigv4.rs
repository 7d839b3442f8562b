//! AWS Signature Version 4 request signing.
//!
//! Header-based signing only: no query-string (presigned) signatures, no
//! chunked payload signing. The canonical query string is always empty.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const SERVICE: &str = "s3";
pub const TERMINATOR: &str = "aws4_request";
/// Payload hash sent for requests without a body.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_FORMAT: &str = "%Y%m%d";

fn hmac(key: &[u8], data: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex SHA-256 of the body, or [`UNSIGNED_PAYLOAD`] when there is none.
pub fn payload_hash(body: Option<&[u8]>) -> String {
    body.map_or_else(|| UNSIGNED_PAYLOAD.to_string(), sha256_hex)
}

/// `date/region/service/aws4_request`
pub fn credential_scope(date: &str, region: &str, service: &str) -> String {
    format!("{date}/{region}/{service}/{TERMINATOR}")
}

/// Lower-cased names and trimmed values, sorted by name.
fn normalized_headers(headers: &[(&str, &str)]) -> Vec<(String, String)> {
    let mut normalized: Vec<_> = headers
        .iter()
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    normalized.sort();
    normalized
}

/// Semicolon-joined, sorted, lower-cased header names.
pub fn signed_headers(headers: &[(&str, &str)]) -> String {
    normalized_headers(headers)
        .into_iter()
        .map(|(name, _)| name)
        .collect::<Vec<_>>()
        .join(";")
}

/// The canonical request for header-based signing.
pub fn canonical_request(
    method: &str,
    uri: &str,
    query: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
) -> String {
    let canonical_headers: String = normalized_headers(headers)
        .into_iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    format!(
        "{method}\n{uri}\n{query}\n{canonical_headers}\n{}\n{payload_hash}",
        signed_headers(headers)
    )
}

pub fn string_to_sign(timestamp: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Four chained HMACs: date, region, service, terminator.
pub fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{secret_key}").as_bytes(), date);
    let k_region = hmac(&k_date, region);
    let k_service = hmac(&k_region, service);
    hmac(&k_service, TERMINATOR)
}

pub fn signature(signing_key: &[u8], string_to_sign: &str) -> String {
    hex::encode(hmac(signing_key, string_to_sign))
}

/// Signs S3 requests with a fixed key pair and region.
#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
    region: String,
}

/// Headers to attach to a signed request, `authorization` included.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub headers: Vec<(String, String)>,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Signs a request addressed to `host` at the already-encoded `uri`.
    ///
    /// Signs `host`, `x-amz-date`, `x-amz-content-sha256`, plus
    /// `content-type` when a body is present.
    pub fn sign(
        &self,
        method: &str,
        host: &str,
        uri: &str,
        body: Option<&[u8]>,
        now: DateTime<Utc>,
    ) -> SignedRequest {
        let timestamp = now.format(TIMESTAMP_FORMAT).to_string();
        let date = now.format(DATE_FORMAT).to_string();
        let content_hash = payload_hash(body);

        let mut headers: Vec<(String, String)> = vec![
            ("host".to_string(), host.to_string()),
            ("x-amz-date".to_string(), timestamp.clone()),
            ("x-amz-content-sha256".to_string(), content_hash.clone()),
        ];
        if body.is_some() {
            headers.push((
                "content-type".to_string(),
                "application/octet-stream".to_string(),
            ));
        }

        let borrowed: Vec<(&str, &str)> = headers
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        let request = canonical_request(method, uri, "", &borrowed, &content_hash);
        let scope = credential_scope(&date, &self.region, SERVICE);
        let to_sign = string_to_sign(&timestamp, &scope, &request);
        let key = derive_signing_key(&self.secret_key, &date, &self.region, SERVICE);

        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={}, Signature={}",
            self.access_key,
            signed_headers(&borrowed),
            signature(&key, &to_sign)
        );
        headers.push(("authorization".to_string(), authorization));

        SignedRequest { headers }
    }
}
