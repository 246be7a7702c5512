//! Checkpoint capture, restore and retention over local storage

use anyhow::Result;
use bytes::Bytes;
use checkpoint::{CheckpointManager, CheckpointManagerConfig};
use runtime_core::{Error, ProgressState};
use std::collections::HashSet;
use std::sync::Arc;
use storage::{LocalStorage, StorageBackend};
use tempfile::TempDir;

fn progress(batches: u64) -> ProgressState {
    ProgressState {
        batches_trained: batches,
        epochs_trained: batches / 25,
        records_trained: batches * 4,
        last_checkpoint_batch: batches,
        last_validation_batch: batches,
    }
}

fn manager(dir: &TempDir, keep_count: usize) -> CheckpointManager {
    CheckpointManager::new(
        Arc::new(LocalStorage::new(dir.path())),
        CheckpointManagerConfig {
            keep_count,
            ..CheckpointManagerConfig::default()
        },
    )
}

#[tokio::test]
async fn test_each_capture_gets_a_new_uuid() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(&dir, 5);

    let mut uuids = HashSet::new();
    for batches in [100, 200, 300] {
        let meta = manager.capture(&progress(batches), Bytes::from(vec![7u8; 64])).await?;
        assert!(uuids.insert(meta.uuid.clone()));
        assert!(dir.path().join(&meta.path).exists());
    }
    assert_eq!(manager.all_checkpoints().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_restore_from_another_manager() -> Result<()> {
    let dir = TempDir::new()?;
    let meta = manager(&dir, 5)
        .capture(&progress(100), Bytes::from_static(b"trainable state"))
        .await?;

    // A fresh manager has an empty index but reads the same directory
    let reader = manager(&dir, 5);
    assert!(reader.latest().is_none());

    let record = reader.restore(&meta.uuid).await?;
    assert_eq!(record.uuid, meta.uuid);
    assert_eq!(record.progress.batches_trained, 100);
    assert_eq!(record.progress.epochs_trained, 4);
    assert_eq!(record.progress, progress(100));
    assert_eq!(record.state_blob, Bytes::from_static(b"trainable state"));
    Ok(())
}

#[tokio::test]
async fn test_retention_deletes_oldest() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(&dir, 2);

    let mut metas = Vec::new();
    for batches in [10, 20, 30] {
        metas.push(manager.capture(&progress(batches), Bytes::from(vec![1u8; 8])).await?);
    }

    assert_eq!(manager.all_checkpoints().len(), 2);
    assert!(manager.get_by_batch(10).is_none());
    assert_eq!(manager.latest().map(|m| m.uuid), Some(metas[2].uuid.clone()));

    let storage = LocalStorage::new(dir.path());
    assert!(!storage.exists(&metas[0].path).await?);

    let err = manager.restore(&metas[0].uuid).await.unwrap_err();
    assert!(matches!(err, Error::CheckpointNotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_truncated_checkpoint_is_corrupted() -> Result<()> {
    let dir = TempDir::new()?;
    let manager = manager(&dir, 5);
    let meta = manager.capture(&progress(50), Bytes::from(vec![3u8; 128])).await?;

    let storage = LocalStorage::new(dir.path());
    let data = storage.read(&meta.path).await?;
    storage.write(&meta.path, data.slice(..data.len() - 10)).await?;

    let err = manager.restore(&meta.uuid).await.unwrap_err();
    assert!(matches!(err, Error::CheckpointCorrupted { .. }));
    assert!(err.is_fatal());
    Ok(())
}
