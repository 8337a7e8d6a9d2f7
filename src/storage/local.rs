use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::ObjectStore;
use crate::errors::ObjectStoreError;

const STAGING_DIR: &str = ".staging";
const URL_SCHEME: &str = "file://";

/// Object store backed by a directory. Blocks are staged as individual files and
/// concatenated on commit.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if key.is_empty() || !safe {
            return Err(ObjectStoreError::InvalidLocation(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn staging_dir(&self, key: &str) -> PathBuf {
        self.root
            .join(STAGING_DIR)
            .join(URL_SAFE_NO_PAD.encode(key.as_bytes()))
    }

    fn block_path(&self, key: &str, block_id: &str) -> PathBuf {
        self.staging_dir(key)
            .join(URL_SAFE_NO_PAD.encode(block_id.as_bytes()))
    }

    /// Concatenates the staged blocks into `partial`.
    async fn assemble(&self, key: &str, block_ids: &[String], partial: &Path) -> Result<(), ObjectStoreError> {
        let mut file = fs::File::create(partial).await?;
        for block_id in block_ids {
            let block = fs::read(self.block_path(key, block_id))
                .await
                .map_err(|e| ObjectStoreError::CommitFailed {
                    key: key.to_string(),
                    reason: format!("block {}: {}", block_id, e),
                })?;
            file.write_all(&block).await?;
        }
        file.flush().await?;
        Ok(())
    }

    fn key_from_url<'a>(&self, url: &'a str) -> Result<&'a str, ObjectStoreError> {
        let path = url
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| ObjectStoreError::InvalidLocation(url.to_string()))?;
        let root = self.root.to_string_lossy();
        path.strip_prefix(root.as_ref())
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| ObjectStoreError::InvalidLocation(url.to_string()))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<(), ObjectStoreError> {
        self.object_path(key)?;
        let dir = self.staging_dir(key);
        fs::create_dir_all(&dir).await?;
        fs::write(self.block_path(key, block_id), &bytes).await?;
        Ok(())
    }

    async fn commit(
        &self,
        key: &str,
        block_ids: &[String],
        _content_type: &str,
    ) -> Result<String, ObjectStoreError> {
        let target = self.object_path(key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Assemble next to the target and rename, so a failed commit leaves nothing behind.
        let partial = PathBuf::from(format!("{}.partial", target.display()));
        let assembled = match self.assemble(key, block_ids, &partial).await {
            Ok(()) => fs::rename(&partial, &target).await.map_err(ObjectStoreError::from),
            Err(e) => Err(e),
        };
        if let Err(e) = assembled {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        self.abort(key).await?;
        debug!("Committed {} blocks to {}", block_ids.len(), target.display());
        Ok(format!("{}{}", URL_SCHEME, target.display()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_full(&self, url: &str) -> Result<Bytes, ObjectStoreError> {
        let key = self.key_from_url(url)?;
        let path = self.object_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn abort(&self, key: &str) -> Result<(), ObjectStoreError> {
        match fs::remove_dir_all(self.staging_dir(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
