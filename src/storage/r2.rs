use chrono::Utc;
use reqwest::{Client, Method};

use crate::config::StorageConfig;
use crate::storage::payload::Payload;
use crate::storage::sigv4::{self, Credentials};
use crate::storage::{StorageError, StorageLocation, StoredObject};

/// Client for an S3-compatible bucket (Cloudflare R2 in production).
#[derive(Clone, Debug)]
pub struct R2Client {
    http_client: Client,
    endpoint: String,
    bucket: String,
    credentials: Credentials,
    public_base_url: Option<String>,
}

impl R2Client {
    pub fn new(config: StorageConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http_client: Client, config: StorageConfig) -> Self {
        Self {
            http_client,
            endpoint: config.endpoint,
            bucket: config.bucket,
            credentials: config.credentials,
            public_base_url: config.public_base_url,
        }
    }

    #[tracing::instrument(
        name = "Put object",
        skip(self, payload),
        fields(bucket = %self.bucket, size = payload.len())
    )]
    pub async fn put_object(
        &self,
        key: &str,
        payload: &Payload,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        self.send_object(Method::PUT, key, payload, content_type).await
    }

    /// Same as [`R2Client::put_object`] for gateways that only accept POST.
    #[tracing::instrument(
        name = "Post object",
        skip(self, payload),
        fields(bucket = %self.bucket, size = payload.len())
    )]
    pub async fn post_object(
        &self,
        key: &str,
        payload: &Payload,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        self.send_object(Method::POST, key, payload, content_type).await
    }

    async fn send_object(
        &self,
        method: Method,
        key: &str,
        payload: &Payload,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let signed = sigv4::sign_upload(
            method.as_str(),
            &self.endpoint,
            &self.bucket,
            key,
            payload,
            content_type,
            &self.credentials,
            &Utc::now(),
        )?;

        let mut request = self.http_client.request(method.clone(), signed.url.clone());
        for (name, value) in signed.headers() {
            // reqwest derives Content-Length from the body itself.
            if name != "Content-Length" {
                request = request.header(name, value);
            }
        }

        let response = request.body(payload.bytes().clone()).send().await.map_err(|e| {
            tracing::error!(error = %e, key = %key, "Object store request failed");
            StorageError::Transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                key = %key,
                method = %method,
                "Object store rejected upload"
            );
            return Err(StorageError::rejected(
                method.as_str(),
                key,
                status.as_u16(),
                &body,
            ));
        }

        tracing::info!(status = %status, key = %key, "Object stored");

        Ok(StoredObject {
            key: key.to_string(),
            url: self.public_url(key)?,
            location: StorageLocation::Remote,
            size: payload.len(),
            content_type: content_type.to_string(),
            sha256: payload.sha256().to_string(),
        })
    }

    /// Deletes `key`. A 404 from the store counts as already deleted.
    #[tracing::instrument(name = "Delete object", skip(self), fields(bucket = %self.bucket))]
    pub async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        let payload = Payload::empty();
        let signed = sigv4::sign_upload(
            Method::DELETE.as_str(),
            &self.endpoint,
            &self.bucket,
            key,
            &payload,
            "application/octet-stream",
            &self.credentials,
            &Utc::now(),
        )?;

        let mut request = self.http_client.delete(signed.url.clone());
        for (name, value) in signed.headers() {
            if name != "Content-Length" {
                request = request.header(name, value);
            }
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            tracing::info!(status = %status, key = %key, "Object deleted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, key = %key, "Object store rejected delete");
        Err(StorageError::rejected("DELETE", key, status.as_u16(), &body))
    }

    pub fn presigned_get(&self, key: &str, expires_secs: u64) -> Result<String, StorageError> {
        let url = sigv4::presign_url(
            Method::GET.as_str(),
            &self.endpoint,
            &self.bucket,
            key,
            &self.credentials,
            &Utc::now(),
            expires_secs,
        )?;
        Ok(url.to_string())
    }

    /// Public URL of `key`: the CDN base when configured, else the
    /// path-style endpoint URL.
    pub fn public_url(&self, key: &str) -> Result<String, StorageError> {
        match &self.public_base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base,
                sigv4::encode_key(key.trim_start_matches('/'))
            )),
            None => Ok(sigv4::object_url(&self.endpoint, &self.bucket, key)?.to_string()),
        }
    }
}
