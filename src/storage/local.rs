use std::path::{Component, Path, PathBuf};

use crate::config::LocalFallbackConfig;
use crate::storage::payload::Payload;
use crate::storage::sigv4::encode_key;
use crate::storage::{StorageError, StorageLocation, StoredObject};

/// Writes objects under a directory on local disk, served back by the API
/// under `public_prefix`.
#[derive(Clone, Debug)]
pub struct LocalDiskStore {
    root: PathBuf,
    public_prefix: String,
}

impl LocalDiskStore {
    pub fn new(config: LocalFallbackConfig) -> Self {
        Self {
            root: config.dir,
            public_prefix: config.public_prefix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    /// Maps `key` to a path under the root, rejecting anything that could
    /// escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidKey(key.to_string());

        if key.is_empty() || key.starts_with('/') || key.contains('\\') {
            return Err(invalid());
        }
        if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
            return Err(invalid());
        }

        let relative = Path::new(key);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(invalid());
        }

        Ok(self.root.join(relative))
    }

    #[tracing::instrument(name = "Save object locally", skip(self, payload), fields(size = payload.len()))]
    pub async fn save(
        &self,
        key: &str,
        payload: &Payload,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, payload.bytes()).await?;

        tracing::info!(path = %path.display(), "Object saved to local disk");

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{}", self.public_prefix.trim_end_matches('/'), encode_key(key)),
            location: StorageLocation::Local,
            size: payload.len(),
            content_type: content_type.to_string(),
            sha256: payload.sha256().to_string(),
        })
    }

    /// Removes a saved object. A missing file is not an error.
    #[tracing::instrument(name = "Remove local object", skip(self))]
    pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Local object already absent");
                Ok(())
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
