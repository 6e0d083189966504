use std::path::Path;

use bytes::Bytes;

use crate::storage::sigv4::sha256_hex;

/// SHA-256 of the empty body, sent on DELETE and other body-less requests.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Request body together with its digest. The hash is always computed over
/// exactly the bytes that get transmitted.
#[derive(Debug, Clone)]
pub struct Payload {
    bytes: Bytes,
    sha256: String,
}

impl Payload {
    pub fn from_bytes(bytes: Bytes) -> Self {
        let sha256 = sha256_hex(&bytes);
        Self { bytes, sha256 }
    }

    /// Reads the whole file in one pass.
    pub async fn from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(Self::from_bytes(Bytes::from(bytes)))
    }

    pub fn empty() -> Self {
        Self {
            bytes: Bytes::new(),
            sha256: EMPTY_PAYLOAD_SHA256.to_string(),
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
