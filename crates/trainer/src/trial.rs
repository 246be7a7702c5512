//! Compute collaborator interface

use data_source::Batch;
use rand_chacha::ChaCha8Rng;
use runtime_core::{Epoch, Metrics, Result, Step};

use crate::Reducer;

/// Per-step context handed to [`Trial::train_batch`]
pub struct StepContext<'a> {
    /// Zero-based index of the batch being trained
    pub batch_index: Step,

    /// Epochs completed before this batch
    pub epoch: Epoch,

    /// Trial RNG. Its state is captured in every checkpoint, so draws made
    /// here replay identically after a restore.
    pub rng: &'a mut ChaCha8Rng,
}

/// Model-specific compute and trainable state
///
/// Each call is one atomic blocking step from the scheduler's point of view;
/// an implementation may parallelize internally. Any error returned is fatal
/// to the run.
pub trait Trial: Send {
    type Record: Send + Sync;

    /// Train on one batch and return its metrics
    fn train_batch(&mut self, batch: &Batch<Self::Record>, ctx: &mut StepContext<'_>)
        -> Result<Metrics>;

    /// Evaluate one validation batch without changing trainable state
    fn evaluate_batch(&self, batch: &Batch<Self::Record>) -> Result<Metrics>;

    /// How per-batch validation values of `metric` are combined
    fn reducer(&self, _metric: &str) -> Reducer {
        Reducer::Avg
    }

    /// Serialize model, optimizer and learning-rate scheduler state
    fn save_state(&self) -> Result<Vec<u8>>;

    /// Load state produced by [`Trial::save_state`]
    fn load_state(&mut self, state: &[u8]) -> Result<()>;
}
