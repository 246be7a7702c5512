//! Checkpoint manager: capture, restore and retention over a storage backend

use bytes::Bytes;
use parking_lot::RwLock;
use runtime_core::{CheckpointMetadata, Error, ProgressState, Result, Step};
use std::collections::BTreeMap;
use storage::SharedStorage;
use tracing::{debug, error, info, warn};

use crate::record::CheckpointRecord;

/// Checkpoint manager configuration
#[derive(Debug, Clone)]
pub struct CheckpointManagerConfig {
    /// Path prefix for checkpoint blobs within the storage backend
    pub prefix: String,

    /// Number of checkpoints to keep
    pub keep_count: usize,
}

impl Default for CheckpointManagerConfig {
    fn default() -> Self {
        Self {
            prefix: "checkpoints".to_string(),
            keep_count: 5,
        }
    }
}

/// Writes and reads checkpoint records
///
/// Captures are awaited to completion before returning, so a returned UUID
/// always names a durable checkpoint.
pub struct CheckpointManager {
    config: CheckpointManagerConfig,

    storage: SharedStorage,

    /// Checkpoints written by this manager, indexed by batch
    checkpoints: RwLock<BTreeMap<Step, CheckpointMetadata>>,
}

impl CheckpointManager {
    pub fn new(storage: SharedStorage, config: CheckpointManagerConfig) -> Self {
        Self {
            config,
            storage,
            checkpoints: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn config(&self) -> &CheckpointManagerConfig {
        &self.config
    }

    /// Storage path of a checkpoint
    pub fn path_for(&self, uuid: &str) -> String {
        format!("{}/{}.ckpt", self.config.prefix, uuid)
    }

    /// Capture a checkpoint of `progress` and `state`.
    ///
    /// Any failure is returned as `CheckpointWriteFailed`; nothing is indexed
    /// unless the write completed.
    pub async fn capture(&self, progress: &ProgressState, state: Bytes) -> Result<CheckpointMetadata> {
        let start = std::time::Instant::now();
        let record = CheckpointRecord::new(*progress, state);
        let path = self.path_for(&record.uuid);

        let size_bytes = self
            .storage
            .write(&path, record.encode())
            .await
            .map_err(|e| {
                error!(checkpoint_id = %record.uuid, error = %e, "Checkpoint write failed");
                Error::CheckpointWriteFailed {
                    message: format!("{}: {}", record.uuid, e),
                }
            })?;

        let metadata = CheckpointMetadata {
            uuid: record.uuid.clone(),
            progress: record.progress,
            path,
            size_bytes,
            created_at: record.created_at,
        };

        {
            let mut checkpoints = self.checkpoints.write();
            if checkpoints.contains_key(&progress.batches_trained) {
                warn!(
                    batch = progress.batches_trained,
                    "Replacing existing checkpoint at batch"
                );
            }
            checkpoints.insert(progress.batches_trained, metadata.clone());
        }

        info!(
            checkpoint_id = %metadata.uuid,
            batch = progress.batches_trained,
            size_bytes,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Checkpoint captured"
        );

        self.cleanup_old_checkpoints().await;
        Ok(metadata)
    }

    /// Read back the checkpoint named `uuid`.
    ///
    /// Works for checkpoints written by another process; the local index is
    /// not consulted.
    pub async fn restore(&self, uuid: &str) -> Result<CheckpointRecord> {
        if uuid.trim().is_empty() {
            return Err(Error::CheckpointNotFound {
                checkpoint_id: uuid.to_string(),
            });
        }

        let data = self
            .storage
            .read(&self.path_for(uuid))
            .await
            .map_err(|e| match e {
                Error::StoragePathNotFound { .. } => Error::CheckpointNotFound {
                    checkpoint_id: uuid.to_string(),
                },
                other => other,
            })?;

        let record = CheckpointRecord::decode(uuid, data)?;
        info!(
            checkpoint_id = %uuid,
            batch = record.progress.batches_trained,
            epoch = record.progress.epochs_trained,
            "Checkpoint restored"
        );
        Ok(record)
    }

    /// Get the latest checkpoint
    pub fn latest(&self) -> Option<CheckpointMetadata> {
        self.checkpoints.read().values().last().cloned()
    }

    /// Get checkpoint by batch
    pub fn get_by_batch(&self, batch: Step) -> Option<CheckpointMetadata> {
        self.checkpoints.read().get(&batch).cloned()
    }

    /// Get all retained checkpoints, oldest first
    pub fn all_checkpoints(&self) -> Vec<CheckpointMetadata> {
        self.checkpoints.read().values().cloned().collect()
    }

    /// Drop checkpoints beyond keep_count. Deletion failures are logged only.
    async fn cleanup_old_checkpoints(&self) {
        let expired: Vec<CheckpointMetadata> = {
            let mut checkpoints = self.checkpoints.write();
            let mut expired = Vec::new();
            while checkpoints.len() > self.config.keep_count {
                match checkpoints.pop_first() {
                    Some((_, meta)) => expired.push(meta),
                    None => break,
                }
            }
            expired
        };

        for meta in expired {
            match self.storage.delete(&meta.path).await {
                Ok(()) => debug!(checkpoint_id = %meta.uuid, "Deleted old checkpoint"),
                Err(e) => {
                    warn!(checkpoint_id = %meta.uuid, error = %e, "Failed to delete old checkpoint")
                }
            }
        }
    }
}
