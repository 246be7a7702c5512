//! Storage backend trait definition

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use runtime_core::Result;

/// Async sink for checkpoint blobs
///
/// Paths are relative to the backend root. A missing path is reported as
/// `Error::StoragePathNotFound` so callers can tell it apart from I/O failure.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the blob stored at `path`
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Store `data` at `path`, returning the number of bytes written.
    ///
    /// A reader never observes a partially written blob.
    async fn write(&self, path: &str, data: Bytes) -> Result<u64>;

    /// Remove the blob at `path`
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if a path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    /// List all paths under `prefix`, sorted
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Storage handle shared between the checkpoint manager and callers
pub type SharedStorage = Arc<dyn StorageBackend>;
