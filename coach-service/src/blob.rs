//! Blob storage for uploaded videos and thumbnails.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::StorageError;

/// Object store addressed by `/`-separated relative paths
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, data: Bytes) -> Result<(), StorageError>;

    async fn get(&self, path: &str) -> Result<Bytes, StorageError>;

    async fn delete(&self, path: &str) -> Result<(), StorageError>;

    /// Public URL the chat platform can fetch the object from
    fn url(&self, path: &str) -> String;
}

/// [`BlobStore`] on the local filesystem, served by the `/media` route
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let valid = !path.is_empty()
            && !path.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StorageError::InvalidPath {
                path: path.to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, source: std::io::Error) -> StorageError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound {
            path: path.to_string(),
        }
    } else {
        StorageError::Io {
            path: path.to_string(),
            source,
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        tokio::fs::write(&target, &data)
            .await
            .map_err(|e| io_error(path, e))?;

        debug!(path = %path, bytes = data.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let target = self.resolve(path)?;
        let data = tokio::fs::read(&target)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        tokio::fs::remove_file(&target)
            .await
            .map_err(|e| io_error(path, e))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/media/{}", self.public_base_url, path)
    }
}
