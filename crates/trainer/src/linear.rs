//! Reference linear-model trial
//!
//! A one-input regression `y = x * mean(w)` over `hidden_size` weights,
//! trained with plain SGD on mean squared error. On the all-ones dataset each
//! step shrinks the error by `1 - 2 * lr / hidden_size`, which makes it a good
//! fixture for loss-monotonicity and resumption checks.

use data_source::{Batch, InMemoryDataSource};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use runtime_core::{ClusterInfo, Error, Metrics, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{StepContext, Trial};

/// Training metric key
pub const LOSS: &str = "loss";

/// Validation metric key
pub const MSE: &str = "mse";

/// Hyperparameters of the linear trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHparams {
    pub hidden_size: usize,
    pub learning_rate: f64,
    pub global_batch_size: usize,

    /// Multiplicative learning-rate decay applied after every step
    #[serde(default = "default_lr_decay")]
    pub lr_decay: f64,
}

fn default_lr_decay() -> f64 {
    1.0
}

impl Default for LinearHparams {
    fn default() -> Self {
        Self {
            hidden_size: 2,
            learning_rate: 0.5,
            global_batch_size: 4,
            lr_decay: 1.0,
        }
    }
}

impl LinearHparams {
    pub fn validate(&self) -> Result<()> {
        if self.hidden_size == 0 {
            return Err(Error::InvalidConfig {
                message: "hidden_size must be at least 1".to_string(),
            });
        }
        if self.global_batch_size == 0 {
            return Err(Error::InvalidConfig {
                message: "global_batch_size must be at least 1".to_string(),
            });
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig {
                message: format!("learning_rate must be positive, got {}", self.learning_rate),
            });
        }
        if !(self.lr_decay > 0.0 && self.lr_decay <= 1.0) {
            return Err(Error::InvalidConfig {
                message: format!("lr_decay must be in (0, 1], got {}", self.lr_decay),
            });
        }
        Ok(())
    }
}

/// One labelled example
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRecord {
    pub x: f64,
    pub y: f64,
}

/// `len` copies of `x = 1, y = 1`
pub fn ones_dataset(len: usize) -> Vec<LinearRecord> {
    vec![LinearRecord { x: 1.0, y: 1.0 }; len]
}

/// Training and validation source over the all-ones dataset
pub fn ones_source(
    hparams: &LinearHparams,
    train_len: usize,
    validation_len: usize,
) -> Result<InMemoryDataSource<LinearRecord>> {
    InMemoryDataSource::new(
        ones_dataset(train_len),
        ones_dataset(validation_len),
        hparams.global_batch_size,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LinearState {
    weights: Vec<f64>,
    learning_rate: f64,
    optimizer_steps: u64,
}

/// The linear trial
#[derive(Debug, Clone)]
pub struct LinearTrial {
    hparams: LinearHparams,
    state: LinearState,
}

impl LinearTrial {
    /// Weights are drawn uniformly from [-1, 1) using `seed`
    pub fn new(hparams: LinearHparams, seed: u64) -> Result<Self> {
        hparams.validate()?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let weights = (0..hparams.hidden_size)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let state = LinearState {
            weights,
            learning_rate: hparams.learning_rate,
            optimizer_steps: 0,
        };
        Ok(Self { hparams, state })
    }

    pub fn from_cluster(cluster: &ClusterInfo) -> Result<Self> {
        Self::new(cluster.hparams()?, cluster.trial_seed)
    }

    pub fn hparams(&self) -> &LinearHparams {
        &self.hparams
    }

    pub fn weights(&self) -> &[f64] {
        &self.state.weights
    }

    pub fn learning_rate(&self) -> f64 {
        self.state.learning_rate
    }

    pub fn optimizer_steps(&self) -> u64 {
        self.state.optimizer_steps
    }

    fn scale(&self) -> f64 {
        self.state.weights.iter().sum::<f64>() / self.state.weights.len() as f64
    }

    /// Mean squared error of `batch` and d(mse)/d(w_i), identical for every i
    fn loss_and_grad(&self, batch: &Batch<LinearRecord>) -> (f64, f64) {
        let scale = self.scale();
        let n = batch.len() as f64;
        let h = self.state.weights.len() as f64;

        let (loss, grad) = batch.records.iter().fold((0.0, 0.0), |(loss, grad), r| {
            let err = r.x * scale - r.y;
            (loss + err * err, grad + 2.0 * err * r.x)
        });
        (loss / n, grad / (n * h))
    }
}

impl Trial for LinearTrial {
    type Record = LinearRecord;

    fn train_batch(
        &mut self,
        batch: &Batch<LinearRecord>,
        ctx: &mut StepContext<'_>,
    ) -> Result<Metrics> {
        if batch.is_empty() {
            return Err(Error::Compute {
                message: format!("batch {} is empty", ctx.batch_index),
            });
        }

        let (loss, grad) = self.loss_and_grad(batch);
        if !loss.is_finite() {
            return Err(Error::Compute {
                message: format!("loss diverged at batch {}: {}", ctx.batch_index, loss),
            });
        }

        let lr = self.state.learning_rate;
        for w in self.state.weights.iter_mut() {
            *w -= lr * grad;
        }
        self.state.learning_rate *= self.hparams.lr_decay;
        self.state.optimizer_steps += 1;

        debug!(batch = ctx.batch_index, loss, lr, "Linear step");

        let mut metrics = Metrics::new();
        metrics.insert(LOSS.to_string(), loss);
        Ok(metrics)
    }

    fn evaluate_batch(&self, batch: &Batch<LinearRecord>) -> Result<Metrics> {
        if batch.is_empty() {
            return Err(Error::Compute {
                message: "validation batch is empty".to_string(),
            });
        }
        let (mse, _) = self.loss_and_grad(batch);

        let mut metrics = Metrics::new();
        metrics.insert(MSE.to_string(), mse);
        Ok(metrics)
    }

    fn save_state(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.state)
            .map_err(|e| Error::Serialization(format!("linear trial state: {}", e)))
    }

    fn load_state(&mut self, state: &[u8]) -> Result<()> {
        let state: LinearState = bincode::deserialize(state)
            .map_err(|e| Error::Serialization(format!("linear trial state: {}", e)))?;

        if state.weights.len() != self.hparams.hidden_size {
            return Err(Error::StateMismatch {
                message: format!(
                    "checkpoint has {} weights, hidden_size is {}",
                    state.weights.len(),
                    self.hparams.hidden_size
                ),
            });
        }
        self.state = state;
        Ok(())
    }
}
