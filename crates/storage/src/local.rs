//! Local filesystem storage backend
//!
//! Blobs are written to a hidden temporary sibling, synced, then renamed into
//! place, so a crash mid-write never leaves a truncated checkpoint behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::{Error, Result};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::StorageBackend;

/// Local filesystem storage backend rooted at a directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the storage root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn staging_path(target: &Path) -> PathBuf {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
    }

    fn not_found_or(path: &str, action: &str, e: std::io::Error) -> Error {
        if e.kind() == ErrorKind::NotFound {
            Error::StoragePathNotFound {
                path: path.to_string(),
            }
        } else {
            Error::Storage {
                message: format!("Failed to {} {}: {}", action, path, e),
            }
        }
    }

    async fn write_staged(staging: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(staging).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
}

#[async_trait]
impl StorageBackend for LocalStorage {
    #[instrument(skip(self), fields(backend = "local"))]
    async fn read(&self, path: &str) -> Result<Bytes> {
        fs::read(self.resolve(path))
            .await
            .map(Bytes::from)
            .map_err(|e| Self::not_found_or(path, "read", e))
    }

    #[instrument(skip(self, data), fields(backend = "local", size = data.len()))]
    async fn write(&self, path: &str, data: Bytes) -> Result<u64> {
        let target = self.resolve(path);
        let staging = Self::staging_path(&target);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Error::Storage {
                message: format!("Failed to create directory {}: {}", parent.display(), e),
            })?;
        }

        if let Err(e) = Self::write_staged(&staging, &data).await {
            let _ = fs::remove_file(&staging).await;
            return Err(Error::Storage {
                message: format!("Failed to stage {}: {}", path, e),
            });
        }

        fs::rename(&staging, &target).await.map_err(|e| Error::Storage {
            message: format!("Failed to move {} into place: {}", path, e),
        })?;

        debug!(path, size = data.len(), "Blob written");
        Ok(data.len() as u64)
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete(&self, path: &str) -> Result<()> {
        fs::remove_file(self.resolve(path))
            .await
            .map_err(|e| Self::not_found_or(path, "delete", e))
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn exists(&self, path: &str) -> Result<bool> {
        match fs::metadata(self.resolve(path)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage {
                message: format!("Failed to stat {}: {}", path, e),
            }),
        }
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(Error::Storage {
                        message: format!("Failed to list {}: {}", dir.display(), e),
                    })
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let entry_path = entry.path();
                if file_type.is_dir() {
                    pending.push(entry_path);
                    continue;
                }
                // Skip blobs still being staged
                if entry.file_name().to_string_lossy().ends_with(".tmp") {
                    continue;
                }
                if let Ok(relative) = entry_path.strip_prefix(&self.root) {
                    let relative = relative.to_string_lossy().replace('\\', "/");
                    if relative.starts_with(prefix) {
                        found.push(relative);
                    }
                }
            }
        }

        found.sort();
        debug!(prefix, count = found.len(), "Listed blobs");
        Ok(found)
    }
}
