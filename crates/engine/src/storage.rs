//! Filesystem-backed artifact store.
//!
//! Stands in for object storage in single-host deployments: artifacts
//! land under a root directory, keys map to relative paths, and the
//! cleanup task ages files out by modification time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use voicereel_core::types::Timestamp;

use crate::error::TaskError;
use crate::traits::BlobStorage;

#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, TaskError> {
        // Keys are service-generated, but reject traversal anyway.
        let relative = Path::new(key);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(TaskError::transient(format!("invalid storage key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    async fn prepare_parent(&self, path: &Path) -> Result<(), TaskError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| TaskError::transient(format!("storage mkdir failed: {err}")))?;
        }
        Ok(())
    }

    fn url_for(&self, path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

#[async_trait]
impl BlobStorage for FsStorage {
    async fn put_file(&self, key: &str, src_path: &str) -> Result<String, TaskError> {
        let dest = self.resolve(key)?;
        self.prepare_parent(&dest).await?;
        tokio::fs::copy(src_path, &dest)
            .await
            .map_err(|err| TaskError::transient(format!("storage copy failed: {err}")))?;
        Ok(self.url_for(&dest))
    }

    async fn put_bytes(&self, key: &str, bytes: &[u8]) -> Result<String, TaskError> {
        let dest = self.resolve(key)?;
        self.prepare_parent(&dest).await?;
        tokio::fs::write(&dest, bytes)
            .await
            .map_err(|err| TaskError::transient(format!("storage write failed: {err}")))?;
        Ok(self.url_for(&dest))
    }

    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64, TaskError> {
        let mut removed = 0u64;
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                // Root may not exist yet if nothing was ever stored.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(TaskError::transient(format!("storage scan failed: {err}")))
                }
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|err| TaskError::transient(format!("storage scan failed: {err}")))?
            {
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(_) => continue,
                };
                if metadata.is_dir() {
                    pending.push(entry.path());
                    continue;
                }
                let Ok(modified) = metadata.modified() else {
                    continue;
                };
                if DateTime::<Utc>::from(modified) < cutoff
                    && tokio::fs::remove_file(entry.path()).await.is_ok()
                {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "expired stored artifacts");
        }
        Ok(removed)
    }
}
