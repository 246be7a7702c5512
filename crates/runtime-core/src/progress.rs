//! Training progress counters

use serde::{Deserialize, Serialize};

use crate::Step;

/// How far training has gone
///
/// Counters never decrease. The scheduler is the only writer, and the whole
/// struct is persisted into every checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub batches_trained: u64,
    pub epochs_trained: u64,
    pub records_trained: u64,
    pub last_checkpoint_batch: Step,
    pub last_validation_batch: Step,
}

impl ProgressState {
    /// Account for one trained batch of `records` records
    pub fn record_batch(&mut self, records: u64) {
        self.batches_trained += 1;
        self.records_trained += records;
    }

    /// Account for an epoch-end signal from the data source
    pub fn record_epoch_end(&mut self) {
        self.epochs_trained += 1;
    }

    pub fn mark_validated(&mut self) {
        self.last_validation_batch = self.batches_trained;
    }

    pub fn mark_checkpointed(&mut self) {
        self.last_checkpoint_batch = self.batches_trained;
    }

    /// True if a validation pass already ran at the current batch
    pub fn validation_is_current(&self) -> bool {
        self.batches_trained > 0 && self.last_validation_batch == self.batches_trained
    }

    /// True if a checkpoint was already captured at the current batch
    pub fn checkpoint_is_current(&self) -> bool {
        self.batches_trained > 0 && self.last_checkpoint_batch == self.batches_trained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_batch_and_epoch() {
        let mut progress = ProgressState::default();
        progress.record_batch(4);
        progress.record_batch(3);
        progress.record_epoch_end();

        assert_eq!(progress.batches_trained, 2);
        assert_eq!(progress.records_trained, 7);
        assert_eq!(progress.epochs_trained, 1);
    }

    #[test]
    fn test_marks_track_current_batch() {
        let mut progress = ProgressState::default();
        assert!(!progress.validation_is_current());

        progress.record_batch(4);
        progress.mark_validated();
        assert!(progress.validation_is_current());
        assert!(!progress.checkpoint_is_current());

        progress.mark_checkpointed();
        progress.record_batch(4);
        assert!(!progress.checkpoint_is_current());
        assert_eq!(progress.last_checkpoint_batch, 1);
    }
}
