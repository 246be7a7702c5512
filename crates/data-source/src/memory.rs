//! In-memory data source
//!
//! Serves a fixed training set in batches, reshuffled per epoch, and a fixed
//! validation set in stored order.

use async_trait::async_trait;
use runtime_core::{Epoch, Error, Result};
use std::sync::Arc;
use tracing::debug;

use crate::{Batch, DataCursor, DataSource, EpochShuffler, SourceEvent};

/// Data source over records held in memory
#[derive(Debug, Clone)]
pub struct InMemoryDataSource<R> {
    train: Arc<Vec<R>>,
    validation: Arc<Vec<R>>,
    batch_size: usize,
    shuffler: EpochShuffler,

    /// Stop after this many epochs; `None` repeats forever
    max_epochs: Option<Epoch>,

    cursor: DataCursor,
}

impl<R: Clone + Send + Sync> InMemoryDataSource<R> {
    pub fn new(train: Vec<R>, validation: Vec<R>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        Ok(Self {
            train: Arc::new(train),
            validation: Arc::new(validation),
            batch_size,
            shuffler: EpochShuffler::sequential(),
            max_epochs: None,
            cursor: DataCursor::default(),
        })
    }

    /// Shuffle training records each epoch using `seed`
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffler = EpochShuffler::with_seed(seed);
        self
    }

    /// Report exhaustion after `epochs` full epochs
    pub fn with_max_epochs(mut self, epochs: Epoch) -> Self {
        self.max_epochs = Some(epochs);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of batches in one training epoch, the last one possibly short
    pub fn batches_per_epoch(&self) -> usize {
        self.train.len().div_ceil(self.batch_size)
    }

    fn epoch_len(&self) -> u64 {
        self.train.len() as u64
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> DataSource for InMemoryDataSource<R> {
    type Record = R;

    async fn next_batch(&mut self) -> Result<SourceEvent<R>> {
        if self.train.is_empty() {
            return Ok(SourceEvent::Exhausted);
        }
        if let Some(max) = self.max_epochs {
            if self.cursor.epoch >= max {
                return Ok(SourceEvent::Exhausted);
            }
        }

        let len = self.epoch_len();
        if self.cursor.offset >= len {
            debug!(epoch = self.cursor.epoch, "Epoch complete");
            self.cursor.epoch += 1;
            self.cursor.offset = 0;
            return Ok(SourceEvent::EpochEnd);
        }

        let order = self.shuffler.order(self.cursor.epoch, len);
        let start = self.cursor.offset as usize;
        let end = (start + self.batch_size).min(len as usize);
        let records = order[start..end]
            .iter()
            .map(|&i| self.train[i as usize].clone())
            .collect();

        let batch = Batch::new(self.cursor.epoch, records);
        self.cursor.offset = end as u64;
        Ok(SourceEvent::Batch(batch))
    }

    async fn validation_batches(&mut self) -> Result<Vec<Batch<R>>> {
        Ok(self
            .validation
            .chunks(self.batch_size)
            .map(|chunk| Batch::new(self.cursor.epoch, chunk.to_vec()))
            .collect())
    }

    fn cursor(&self) -> DataCursor {
        self.cursor
    }

    fn seek(&mut self, cursor: DataCursor) -> Result<()> {
        if cursor.offset > self.epoch_len() {
            return Err(Error::StateMismatch {
                message: format!(
                    "cursor offset {} is beyond the {} training records",
                    cursor.offset,
                    self.epoch_len()
                ),
            });
        }
        debug!(epoch = cursor.epoch, offset = cursor.offset, "Seeking data source");
        self.cursor = cursor;
        Ok(())
    }
}
