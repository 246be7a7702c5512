//! Trainer snapshot stored in the checkpoint state blob

use bytes::Bytes;
use data_source::{DataCursor, DataSource};
use rand_chacha::ChaCha8Rng;
use runtime_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::Trial;

/// Everything besides progress counters needed to resume a run exactly
///
/// Encoded with bincode, so field order is fixed and floats round-trip
/// bit-for-bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSnapshot {
    /// Output of [`Trial::save_state`]
    pub trial_state: Vec<u8>,

    /// Position of the training stream right after the last trained batch
    pub data_cursor: DataCursor,

    /// Trial RNG
    pub rng: ChaCha8Rng,
}

impl TrainerSnapshot {
    pub fn capture<T, D>(trial: &T, source: &D, rng: &ChaCha8Rng) -> Result<Self>
    where
        T: Trial,
        D: DataSource<Record = T::Record>,
    {
        Ok(Self {
            trial_state: trial.save_state()?,
            data_cursor: source.cursor(),
            rng: rng.clone(),
        })
    }

    pub fn encode(&self) -> Result<Bytes> {
        bincode::serialize(self)
            .map(Bytes::from)
            .map_err(|e| Error::Serialization(format!("trainer snapshot: {}", e)))
    }

    /// Decode the state blob of checkpoint `checkpoint_id`
    pub fn decode(checkpoint_id: &str, data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| Error::CheckpointCorrupted {
            checkpoint_id: checkpoint_id.to_string(),
            reason: format!("bad trainer snapshot: {}", e),
        })
    }
}
