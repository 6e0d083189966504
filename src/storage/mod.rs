//! Object storage: SigV4 signing, the R2 client and the local disk fallback.

pub mod local;
pub mod payload;
pub mod r2;
pub mod sigv4;

use serde::{Deserialize, Serialize};

pub use local::LocalDiskStore;
pub use payload::Payload;
pub use r2::R2Client;
pub use sigv4::{Credentials, SigningError};

/// Longest store response body kept in an error.
const MAX_ERROR_BODY: usize = 512;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("object store rejected {method} {key} with HTTP {status}: {body}")]
    Rejected {
        method: String,
        key: String,
        status: u16,
        body: String,
    },

    #[error("object store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid object key `{0}`")]
    InvalidKey(String),

    #[error("request signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("local storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn rejected(method: &str, key: &str, status: u16, body: &str) -> Self {
        StorageError::Rejected {
            method: method.to_string(),
            key: key.to_string(),
            status,
            body: truncate(body, MAX_ERROR_BODY),
        }
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub location: StorageLocation,
    pub size: usize,
    pub content_type: String,
    pub sha256: String,
}
