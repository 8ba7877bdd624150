//! S3-compatible object store (MinIO, AWS S3, and the like).
//!
//! Blocking reqwest client, no Tokio runtime required. Requests are signed
//! with AWS Signature Version 4 over three headers: `host`,
//! `x-amz-content-sha256` and `x-amz-date`. No retries: a failed request
//! is reported as `Unavailable` and the caller decides what to do.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::object_store::ObjectStore;

type HmacSha256 = Hmac<Sha256>;

const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// Connection settings for an S3-compatible endpoint.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Base URL, e.g. `http://localhost:9000`
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    /// `{endpoint}/{bucket}/{key}` when true, `{bucket}.{host}/{key}` otherwise
    pub path_style: bool,
}

pub struct S3Store {
    http: reqwest::blocking::Client,
    config: S3Config,
    scheme: String,
    /// Host as sent in the `host` header (port only when non-default)
    authority: String,
}

impl S3Store {
    pub fn new(config: S3Config) -> Result<Self, StoreError> {
        let (scheme, rest) = config
            .endpoint
            .split_once("://")
            .filter(|(scheme, _)| *scheme == "http" || *scheme == "https")
            .ok_or_else(|| {
                StoreError::Unavailable(format!("invalid S3 endpoint '{}'", config.endpoint))
            })?;

        let host = rest.trim_end_matches('/');
        if host.is_empty() || host.contains('/') {
            return Err(StoreError::Unavailable(format!(
                "S3 endpoint must not carry a path: '{}'",
                config.endpoint
            )));
        }
        let default_port = if scheme == "https" { ":443" } else { ":80" };
        let host = host.strip_suffix(default_port).unwrap_or(host);

        let authority = if config.path_style {
            host.to_string()
        } else {
            format!("{}.{}", config.bucket, host)
        };

        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("cellvault/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            scheme: scheme.to_string(),
            authority,
            config,
        })
    }

    fn canonical_path(&self, key: &str) -> String {
        let encoded: Vec<String> = key.split('/').map(uri_encode).collect();
        if self.config.path_style {
            format!("/{}/{}", uri_encode(&self.config.bucket), encoded.join("/"))
        } else {
            format!("/{}", encoded.join("/"))
        }
    }

    fn send(
        &self,
        method: reqwest::Method,
        key: &str,
        body: Option<&[u8]>,
    ) -> Result<reqwest::blocking::Response, StoreError> {
        let path = self.canonical_path(key);
        let url = format!("{}://{}{}", self.scheme, self.authority, path);
        let payload_hash = sha256_hex(body.unwrap_or_default());
        let now = Utc::now();

        let authorization = sign(
            &SigningInput {
                method: method.as_str(),
                path: &path,
                host: &self.authority,
                payload_hash: &payload_hash,
                region: &self.config.region,
                access_key: &self.config.access_key,
                secret_key: &self.config.secret_key,
            },
            now,
        )?;

        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("host", &self.authority)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", amz_date(now))
            .header("authorization", authorization);
        if let Some(bytes) = body {
            request = request.body(bytes.to_vec());
        }

        log::debug!("S3 {} {}", method, url);
        request
            .send()
            .map_err(|e| StoreError::Unavailable(format!("{} {}: {}", method, key, e)))
    }
}

fn status_error(key: &str, response: reqwest::blocking::Response) -> StoreError {
    let status = response.status().as_u16();
    if status == 404 {
        return StoreError::NotFound(key.to_string());
    }
    let body = response.text().unwrap_or_default();
    StoreError::Unavailable(format!("HTTP {} for '{}': {}", status, key, body.trim()))
}

impl ObjectStore for S3Store {
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let response = self.send(reqwest::Method::GET, key, None)?;
        if !response.status().is_success() {
            return Err(status_error(key, response));
        }
        let bytes = response
            .bytes()
            .map_err(|e| StoreError::Unavailable(format!("reading '{}': {}", key, e)))?;
        Ok(bytes.to_vec())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let response = self.send(reqwest::Method::PUT, key, Some(bytes))?;
        if !response.status().is_success() {
            return Err(status_error(key, response));
        }
        log::debug!("S3 stored {} bytes at {}/{}", bytes.len(), self.config.bucket, key);
        Ok(())
    }
}

// ── Signature V4 ────────────────────────────────────────────────────

struct SigningInput<'a> {
    method: &'a str,
    path: &'a str,
    host: &'a str,
    payload_hash: &'a str,
    region: &'a str,
    access_key: &'a str,
    secret_key: &'a str,
}

fn amz_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Value of the `authorization` header for one request.
fn sign(input: &SigningInput<'_>, at: DateTime<Utc>) -> Result<String, StoreError> {
    let timestamp = amz_date(at);
    let date = at.format("%Y%m%d").to_string();
    let scope = format!("{}/{}/s3/aws4_request", date, input.region);

    let canonical_request = format!(
        "{}\n{}\n\nhost:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n\n{}\n{}",
        input.method,
        input.path,
        input.host,
        input.payload_hash,
        timestamp,
        SIGNED_HEADERS,
        input.payload_hash
    );

    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        timestamp,
        scope,
        sha256_hex(canonical_request.as_bytes())
    );

    let key = signing_key(input.secret_key, &date, input.region, "s3")?;
    let signature = to_hex(&hmac_sha256(&key, string_to_sign.as_bytes())?);

    Ok(format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        input.access_key, scope, SIGNED_HEADERS, signature
    ))
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>, StoreError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::Unavailable(format!("signing key rejected: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn sha256_hex(data: &[u8]) -> String {
    to_hex(&Sha256::digest(data))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// RFC 3986 encoding of one path segment (unreserved characters kept).
fn uri_encode(s: &str) -> String {
    let mut encoded = String::with_capacity(s.len() * 2);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    encoded
}
