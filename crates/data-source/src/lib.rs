//! Data sources for the training scheduler
//!
//! A training source yields batches one at a time and signals epoch ends and
//! exhaustion in-band. Validation data is a bounded list of batches. Every
//! source exposes a [`DataCursor`] so a restored checkpoint resumes on the
//! batch right after the one it was captured at.

pub mod epoch;
pub mod memory;

use async_trait::async_trait;
use runtime_core::{Epoch, Result};
use serde::{Deserialize, Serialize};

pub use epoch::EpochShuffler;
pub use memory::InMemoryDataSource;

/// A batch of records
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<R> {
    /// Epoch this batch was drawn from
    pub epoch: Epoch,

    pub records: Vec<R>,
}

impl<R> Batch<R> {
    pub fn new(epoch: Epoch, records: Vec<R>) -> Self {
        Self { epoch, records }
    }

    /// Number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// What a pull from the training source produced
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent<R> {
    /// The next batch
    Batch(Batch<R>),

    /// The current epoch is complete; the next pull starts a new epoch
    EpochEnd,

    /// No more data will be produced
    Exhausted,
}

/// Position of a training source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataCursor {
    /// Current epoch
    pub epoch: Epoch,

    /// Records already consumed in the current epoch
    pub offset: u64,
}

/// Training and validation data collaborator
#[async_trait]
pub trait DataSource: Send {
    type Record: Send + Sync;

    /// Pull the next training event. Pulls are never reordered.
    async fn next_batch(&mut self) -> Result<SourceEvent<Self::Record>>;

    /// The full, bounded validation set in a fixed order
    async fn validation_batches(&mut self) -> Result<Vec<Batch<Self::Record>>>;

    /// Current position of the training stream
    fn cursor(&self) -> DataCursor;

    /// Move the training stream to `cursor`
    fn seek(&mut self, cursor: DataCursor) -> Result<()>;
}
