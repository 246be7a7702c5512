//! Checkpoint record encoding
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic "CKPT" | version u32 | uuid_len u32 | uuid
//! batches_trained u64 | epochs_trained u64 | records_trained u64
//! last_checkpoint_batch u64 | last_validation_batch u64
//! created_at_micros i64 | state_len u64 | state
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use runtime_core::{CheckpointId, Error, ProgressState, Result};

/// Magic bytes for checkpoint records
pub const CHECKPOINT_MAGIC: [u8; 4] = *b"CKPT";

/// Checkpoint format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// A durable snapshot of progress and trainable state
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub uuid: CheckpointId,
    pub progress: ProgressState,
    pub state_blob: Bytes,
    pub created_at: DateTime<Utc>,
}

impl CheckpointRecord {
    /// Create a record with a fresh UUID
    pub fn new(progress: ProgressState, state_blob: Bytes) -> Self {
        Self {
            uuid: uuid::Uuid::new_v4().to_string(),
            progress,
            state_blob,
            created_at: Utc::now(),
        }
    }

    /// Encode the record with a fixed field order
    pub fn encode(&self) -> Bytes {
        let uuid = self.uuid.as_bytes();
        let mut buf = BytesMut::with_capacity(4 + 4 + 4 + uuid.len() + 8 * 7 + self.state_blob.len());

        buf.put_slice(&CHECKPOINT_MAGIC);
        buf.put_u32_le(CHECKPOINT_VERSION);
        buf.put_u32_le(uuid.len() as u32);
        buf.put_slice(uuid);

        let p = &self.progress;
        buf.put_u64_le(p.batches_trained);
        buf.put_u64_le(p.epochs_trained);
        buf.put_u64_le(p.records_trained);
        buf.put_u64_le(p.last_checkpoint_batch);
        buf.put_u64_le(p.last_validation_batch);

        buf.put_i64_le(self.created_at.timestamp_micros());
        buf.put_u64_le(self.state_blob.len() as u64);
        buf.put_slice(&self.state_blob);

        buf.freeze()
    }

    /// Decode a record read back for `expected_uuid`
    pub fn decode(expected_uuid: &str, mut data: Bytes) -> Result<Self> {
        let corrupted = |reason: String| Error::CheckpointCorrupted {
            checkpoint_id: expected_uuid.to_string(),
            reason,
        };

        let magic = take(&mut data, 4, "magic").map_err(&corrupted)?;
        if magic[..] != CHECKPOINT_MAGIC {
            return Err(corrupted("invalid checkpoint magic".to_string()));
        }

        let version = take_u32(&mut data, "version").map_err(&corrupted)?;
        if version != CHECKPOINT_VERSION {
            return Err(corrupted(format!(
                "unsupported version {} (expected {})",
                version, CHECKPOINT_VERSION
            )));
        }

        let uuid_len = take_u32(&mut data, "uuid length").map_err(&corrupted)? as usize;
        let uuid = take(&mut data, uuid_len, "uuid").map_err(&corrupted)?;
        let uuid = String::from_utf8(uuid.to_vec())
            .map_err(|_| corrupted("uuid is not valid utf-8".to_string()))?;
        if uuid != expected_uuid {
            return Err(corrupted(format!("record belongs to checkpoint {}", uuid)));
        }

        let progress = ProgressState {
            batches_trained: take_u64(&mut data, "batches_trained").map_err(&corrupted)?,
            epochs_trained: take_u64(&mut data, "epochs_trained").map_err(&corrupted)?,
            records_trained: take_u64(&mut data, "records_trained").map_err(&corrupted)?,
            last_checkpoint_batch: take_u64(&mut data, "last_checkpoint_batch")
                .map_err(&corrupted)?,
            last_validation_batch: take_u64(&mut data, "last_validation_batch")
                .map_err(&corrupted)?,
        };

        let micros = take_u64(&mut data, "created_at").map_err(&corrupted)? as i64;
        let created_at = DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| corrupted(format!("invalid timestamp {}", micros)))?;

        let state_len = take_u64(&mut data, "state length").map_err(&corrupted)? as usize;
        let state_blob = take(&mut data, state_len, "state").map_err(&corrupted)?;
        if data.has_remaining() {
            return Err(corrupted(format!("{} trailing bytes", data.remaining())));
        }

        Ok(Self {
            uuid,
            progress,
            state_blob,
            created_at,
        })
    }
}

fn take(data: &mut Bytes, len: usize, field: &str) -> std::result::Result<Bytes, String> {
    if data.remaining() < len {
        return Err(format!(
            "truncated at {}: need {} bytes, have {}",
            field,
            len,
            data.remaining()
        ));
    }
    Ok(data.split_to(len))
}

fn take_u32(data: &mut Bytes, field: &str) -> std::result::Result<u32, String> {
    take(data, 4, field).map(|mut b| b.get_u32_le())
}

fn take_u64(data: &mut Bytes, field: &str) -> std::result::Result<u64, String> {
    take(data, 8, field).map(|mut b| b.get_u64_le())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> CheckpointRecord {
        let progress = ProgressState {
            batches_trained: 100,
            epochs_trained: 3,
            records_trained: 400,
            last_checkpoint_batch: 100,
            last_validation_batch: 100,
        };
        CheckpointRecord::new(progress, Bytes::from(vec![7u8; 64]))
    }

    #[test]
    fn test_decode_restores_fields() {
        let record = sample_record();
        let decoded = CheckpointRecord::decode(&record.uuid, record.encode()).unwrap();

        assert_eq!(decoded.uuid, record.uuid);
        assert_eq!(decoded.progress, record.progress);
        assert_eq!(decoded.state_blob, record.state_blob);
        assert_eq!(
            decoded.created_at.timestamp_micros(),
            record.created_at.timestamp_micros()
        );
    }

    #[test]
    fn test_fresh_uuid_per_record() {
        assert_ne!(sample_record().uuid, sample_record().uuid);
    }

    #[test]
    fn test_bad_magic() {
        let record = sample_record();
        let mut bytes = record.encode().to_vec();
        bytes[0] = b'X';
        let err = CheckpointRecord::decode(&record.uuid, Bytes::from(bytes)).unwrap_err();
        assert!(matches!(err, Error::CheckpointCorrupted { .. }));
    }

    #[test]
    fn test_version_mismatch() {
        let record = sample_record();
        let mut bytes = record.encode().to_vec();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        let err = CheckpointRecord::decode(&record.uuid, Bytes::from(bytes)).unwrap_err();
        match err {
            Error::CheckpointCorrupted { reason, .. } => assert!(reason.contains("version 99")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncated() {
        let record = sample_record();
        let bytes = record.encode();
        let truncated = bytes.slice(..bytes.len() - 10);
        assert!(CheckpointRecord::decode(&record.uuid, truncated).is_err());
    }

    #[test]
    fn test_uuid_mismatch() {
        let record = sample_record();
        let err = CheckpointRecord::decode("someone-else", record.encode()).unwrap_err();
        assert!(matches!(err, Error::CheckpointCorrupted { .. }));
    }
}
