//! Store-then-fallback orchestration for uploaded media.

pub mod keys;

use crate::storage::{LocalDiskStore, Payload, R2Client, StorageError, StoredObject};

pub use keys::UploadKind;

#[derive(Clone, Debug)]
pub struct UploadService {
    remote: R2Client,
    fallback: Option<LocalDiskStore>,
}

impl UploadService {
    pub fn new(remote: R2Client, fallback: Option<LocalDiskStore>) -> Self {
        Self { remote, fallback }
    }

    pub fn fallback(&self) -> Option<&LocalDiskStore> {
        self.fallback.as_ref()
    }

    /// Uploads to the object store. When that fails and a local fallback is
    /// configured the file is written to disk instead.
    #[tracing::instrument(name = "Store upload", skip(self, payload), fields(size = payload.len()))]
    pub async fn store(
        &self,
        key: &str,
        payload: &Payload,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        match self.remote.put_object(key, payload, content_type).await {
            Ok(stored) => Ok(stored),
            Err(e) => match &self.fallback {
                Some(local) => {
                    tracing::warn!(
                        error = %e,
                        key = %key,
                        "Object store upload failed, saving to local disk"
                    );
                    local.save(key, payload, content_type).await
                }
                None => Err(e),
            },
        }
    }

    /// Deletes remotely, and from the fallback directory when there is one.
    #[tracing::instrument(name = "Remove upload", skip(self))]
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.remote.delete_object(key).await?;
        if let Some(local) = &self.fallback {
            local.remove(key).await?;
        }
        Ok(())
    }

    pub fn presigned_get(&self, key: &str, expires_secs: u64) -> Result<String, StorageError> {
        self.remote.presigned_get(key, expires_secs)
    }
}
