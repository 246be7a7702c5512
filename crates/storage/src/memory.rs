//! In-memory storage backend
//!
//! Holds blobs in a map. Writes and reads can be made to fail on demand so
//! tests can drive the fatal storage paths of the scheduler.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use runtime_core::{Error, Result};
use tracing::debug;

use crate::StorageBackend;

#[derive(Debug, Default)]
struct Inner {
    blobs: RwLock<BTreeMap<String, Bytes>>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

/// In-memory storage; clones share the same blobs
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.inner.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace a stored blob without going through `write`
    pub fn put_raw(&self, path: &str, data: Bytes) {
        self.inner.blobs.write().insert(path.to_string(), data);
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn read(&self, path: &str) -> Result<Bytes> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage {
                message: format!("read of {} rejected: storage unavailable", path),
            });
        }
        self.inner
            .blobs
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::StoragePathNotFound {
                path: path.to_string(),
            })
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<u64> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage {
                message: format!("write of {} rejected: storage unavailable", path),
            });
        }
        let size = data.len() as u64;
        self.inner.blobs.write().insert(path.to_string(), data);
        debug!(path, size, backend = "memory", "Blob written");
        Ok(size)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.inner
            .blobs
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Error::StoragePathNotFound {
                path: path.to_string(),
            })
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.inner.blobs.read().contains_key(path))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .blobs
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_and_list() {
        let storage = InMemoryStorage::new();
        storage
            .write("checkpoints/b.ckpt", Bytes::from("b"))
            .await
            .unwrap();
        storage
            .write("checkpoints/a.ckpt", Bytes::from("a"))
            .await
            .unwrap();

        assert_eq!(
            storage.read("checkpoints/a.ckpt").await.unwrap(),
            Bytes::from("a")
        );
        assert_eq!(
            storage.list("checkpoints/").await.unwrap(),
            vec!["checkpoints/a.ckpt", "checkpoints/b.ckpt"]
        );
    }

    #[tokio::test]
    async fn test_clones_share_blobs() {
        let storage = InMemoryStorage::new();
        let other = storage.clone();
        storage.write("x", Bytes::from("1")).await.unwrap();
        assert!(other.exists("x").await.unwrap());
        other.delete("x").await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let storage = InMemoryStorage::new();
        storage.set_fail_writes(true);
        assert!(matches!(
            storage.write("x", Bytes::from("1")).await,
            Err(Error::Storage { .. })
        ));
        storage.set_fail_writes(false);
        storage.write("x", Bytes::from("1")).await.unwrap();

        storage.set_fail_reads(true);
        assert!(matches!(storage.read("x").await, Err(Error::Storage { .. })));
    }
}
