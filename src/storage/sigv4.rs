//! AWS Signature Version 4 for S3-compatible object stores.
//!
//! Builds the `Authorization` header (or the pre-signed query string) for a
//! single request against R2 or any other S3 API, without a vendor SDK.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use url::Url;

use crate::storage::payload::Payload;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
pub const SERVICE: &str = "s3";
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// S3 rejects pre-signed URLs valid for longer than seven days.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const DATE_FORMAT: &str = "%Y%m%d";

#[derive(thiserror::Error, Debug)]
pub enum SigningError {
    #[error("invalid object store endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("object store endpoint `{0}` has no host")]
    MissingHost(String),

    #[error("pre-signed URL expiry must be between 1 and 604800 seconds, got {0}")]
    InvalidExpiry(u64),
}

#[derive(Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: Secret<String>,
    pub region: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("region", &self.region)
            .finish()
    }
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: Secret::new(secret_access_key.into()),
            region: region.into(),
        }
    }

    /// `YYYYMMDD/<region>/s3/aws4_request`
    pub fn scope(&self, timestamp: &DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/aws4_request",
            timestamp.format(DATE_FORMAT),
            self.region,
            SERVICE
        )
    }
}

/// Headers to attach to a signed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub url: Url,
    pub authorization: String,
    pub amz_date: String,
    pub content_sha256: String,
    pub host: String,
    pub content_type: String,
    pub content_length: usize,
    pub signature: String,
}

impl SignedRequest {
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Authorization", self.authorization.clone()),
            ("x-amz-date", self.amz_date.clone()),
            ("x-amz-content-sha256", self.content_sha256.clone()),
            ("Host", self.host.clone()),
            ("Content-Type", self.content_type.clone()),
            ("Content-Length", self.content_length.to_string()),
        ]
    }
}

/// Result of signing an arbitrary header set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    pub header: String,
    pub signed_headers: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    pub method: String,
    pub uri: String,
    pub query: String,
    /// Lower-cased names, sorted, values trimmed.
    pub headers: Vec<(String, String)>,
    pub payload_hash: String,
}

impl CanonicalRequest {
    pub fn new(
        method: &str,
        uri: &str,
        query: &str,
        headers: &[(&str, &str)],
        payload_hash: &str,
    ) -> Self {
        let mut headers: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| (name.trim().to_lowercase(), collapse_whitespace(value)))
            .collect();
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            method: method.to_uppercase(),
            uri: uri.to_string(),
            query: query.to_string(),
            headers,
            payload_hash: payload_hash.to_string(),
        }
    }

    pub fn signed_headers(&self) -> String {
        self.headers
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn render(&self) -> String {
        let canonical_headers: String = self
            .headers
            .iter()
            .map(|(name, value)| format!("{}:{}\n", name, value))
            .collect();

        format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.uri,
            self.query,
            canonical_headers,
            self.signed_headers(),
            self.payload_hash
        )
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Percent-encodes one path segment with the S3 unreserved set.
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Encodes every `/`-separated segment of `key` on its own. Encoding the
/// whole path would turn the separators into `%2F` and the store answers 403.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(encode_segment)
        .collect::<Vec<_>>()
        .join("/")
}

/// Path-style canonical URI: `/<bucket>/<key>`.
pub fn canonical_uri(bucket: &str, key: &str) -> String {
    format!(
        "/{}/{}",
        encode_segment(bucket),
        encode_key(key.trim_start_matches('/'))
    )
}

pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

pub fn string_to_sign(
    timestamp: &DateTime<Utc>,
    scope: &str,
    canonical_request: &CanonicalRequest,
) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        format_timestamp(timestamp),
        scope,
        sha256_hex(canonical_request.render().as_bytes())
    )
}

fn signature_for(
    canonical_request: &CanonicalRequest,
    credentials: &Credentials,
    timestamp: &DateTime<Utc>,
) -> String {
    let scope = credentials.scope(timestamp);
    let key = derive_signing_key(
        credentials.secret_access_key.expose_secret(),
        &timestamp.format(DATE_FORMAT).to_string(),
        &credentials.region,
        SERVICE,
    );
    hex::encode(hmac_sha256(
        &key,
        string_to_sign(timestamp, &scope, canonical_request).as_bytes(),
    ))
}

/// Signs an arbitrary header set. `uri` must already be canonical.
pub fn sign_headers(
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    payload_hash: &str,
    credentials: &Credentials,
    timestamp: &DateTime<Utc>,
) -> Authorization {
    let canonical_request = CanonicalRequest::new(method, uri, "", headers, payload_hash);
    let signature = signature_for(&canonical_request, credentials, timestamp);
    let signed_headers = canonical_request.signed_headers();

    Authorization {
        header: format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            credentials.access_key_id,
            credentials.scope(timestamp),
            signed_headers,
            signature
        ),
        signed_headers,
        signature,
    }
}

/// `host[:port]` as sent on the wire; default ports are omitted.
pub fn host_header(url: &Url) -> Result<String, SigningError> {
    let host = url
        .host_str()
        .ok_or_else(|| SigningError::MissingHost(url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Path-style object URL under `endpoint`. Any path on the endpoint is
/// replaced.
pub fn object_url(endpoint: &str, bucket: &str, key: &str) -> Result<Url, SigningError> {
    let mut url = Url::parse(endpoint)?;
    url.set_path(&canonical_uri(bucket, key));
    url.set_query(None);
    Ok(url)
}

#[allow(clippy::too_many_arguments)]
#[tracing::instrument(
    name = "Sign object store request",
    skip(payload, credentials),
    fields(size = payload.len())
)]
pub fn sign_upload(
    method: &str,
    endpoint: &str,
    bucket: &str,
    key: &str,
    payload: &Payload,
    content_type: &str,
    credentials: &Credentials,
    timestamp: &DateTime<Utc>,
) -> Result<SignedRequest, SigningError> {
    let url = object_url(endpoint, bucket, key)?;
    let host = host_header(&url)?;
    let amz_date = format_timestamp(timestamp);
    let payload_hash = payload.sha256().to_string();

    let authorization = sign_headers(
        method,
        url.path(),
        &[
            ("content-type", content_type),
            ("host", &host),
            ("x-amz-content-sha256", &payload_hash),
            ("x-amz-date", &amz_date),
        ],
        &payload_hash,
        credentials,
        timestamp,
    );

    tracing::debug!(
        signed_headers = %authorization.signed_headers,
        uri = %url.path(),
        "Request signed"
    );

    Ok(SignedRequest {
        url,
        authorization: authorization.header,
        amz_date,
        content_sha256: payload_hash,
        host,
        content_type: content_type.to_string(),
        content_length: payload.len(),
        signature: authorization.signature,
    })
}

/// Query-string authentication for `uri` on `host`. Returns the full query
/// string including `X-Amz-Signature`.
pub fn presign_query(
    method: &str,
    host: &str,
    uri: &str,
    credentials: &Credentials,
    timestamp: &DateTime<Utc>,
    expires_secs: u64,
) -> Result<String, SigningError> {
    if expires_secs == 0 || expires_secs > MAX_PRESIGN_EXPIRY_SECS {
        return Err(SigningError::InvalidExpiry(expires_secs));
    }

    let credential = format!(
        "{}/{}",
        credentials.access_key_id,
        credentials.scope(timestamp)
    );
    // Already in lexicographic order.
    let params = [
        ("X-Amz-Algorithm", ALGORITHM.to_string()),
        ("X-Amz-Credential", credential),
        ("X-Amz-Date", format_timestamp(timestamp)),
        ("X-Amz-Expires", expires_secs.to_string()),
        ("X-Amz-SignedHeaders", "host".to_string()),
    ];
    let query = params
        .iter()
        .map(|(name, value)| format!("{}={}", encode_segment(name), encode_segment(value)))
        .collect::<Vec<_>>()
        .join("&");

    let canonical_request =
        CanonicalRequest::new(method, uri, &query, &[("host", host)], UNSIGNED_PAYLOAD);
    let signature = signature_for(&canonical_request, credentials, timestamp);

    Ok(format!("{}&X-Amz-Signature={}", query, signature))
}

pub fn presign_url(
    method: &str,
    endpoint: &str,
    bucket: &str,
    key: &str,
    credentials: &Credentials,
    timestamp: &DateTime<Utc>,
    expires_secs: u64,
) -> Result<Url, SigningError> {
    let mut url = object_url(endpoint, bucket, key)?;
    let host = host_header(&url)?;
    let query = presign_query(method, &host, url.path(), credentials, timestamp, expires_secs)?;
    url.set_query(Some(&query));
    Ok(url)
}
