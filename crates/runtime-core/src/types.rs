//! Core type definitions for the training runtime

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ProgressState;

/// Unique identifier types
pub type CheckpointId = String;

/// Training step and epoch counters
pub type Step = u64;
pub type Epoch = u64;

/// Metric name to value mapping, ordered by name
pub type Metrics = BTreeMap<String, f64>;

/// Unit in which a boundary is expressed
///
/// Deserializes from `{"batches": n}`, `{"records": n}` or `{"epochs": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryUnit {
    /// Count of trained batches
    Batches(u64),

    /// Count of trained records
    Records(u64),

    /// Count of completed epochs, as signalled by the data source
    Epochs(u64),
}

impl BoundaryUnit {
    /// The configured count
    pub fn count(&self) -> u64 {
        match *self {
            BoundaryUnit::Batches(n) | BoundaryUnit::Records(n) | BoundaryUnit::Epochs(n) => n,
        }
    }

    /// A zero count disables the boundary
    pub fn is_disabled(&self) -> bool {
        self.count() == 0
    }

    /// Reads the counter this unit is measured against
    pub fn counter(&self, progress: &ProgressState) -> u64 {
        match self {
            BoundaryUnit::Batches(_) => progress.batches_trained,
            BoundaryUnit::Records(_) => progress.records_trained,
            BoundaryUnit::Epochs(_) => progress.epochs_trained,
        }
    }
}

impl fmt::Display for BoundaryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryUnit::Batches(n) => write!(f, "{} batches", n),
            BoundaryUnit::Records(n) => write!(f, "{} records", n),
            BoundaryUnit::Epochs(n) => write!(f, "{} epochs", n),
        }
    }
}

/// Role of a boundary in the scheduler
///
/// Declaration order is evaluation priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Periodic checkpoint capture
    Checkpoint,

    /// Periodic validation pass
    Validate,

    /// Absolute training-length limit
    Train,
}

/// A configured trigger or stopping condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainBoundary {
    pub kind: BoundaryKind,
    pub unit: BoundaryUnit,
}

impl TrainBoundary {
    pub fn new(kind: BoundaryKind, unit: BoundaryUnit) -> Self {
        Self { kind, unit }
    }

    pub fn train(unit: BoundaryUnit) -> Self {
        Self::new(BoundaryKind::Train, unit)
    }

    pub fn validate(unit: BoundaryUnit) -> Self {
        Self::new(BoundaryKind::Validate, unit)
    }

    pub fn checkpoint(unit: BoundaryUnit) -> Self {
        Self::new(BoundaryKind::Checkpoint, unit)
    }
}

/// Step type that produced a metric sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Training,
    Validation,
}

/// One metric dictionary produced by a training step or a validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Producing step type
    pub kind: StepKind,

    /// For training, the zero-based index of the batch. For validation,
    /// the number of batches trained when the pass ran.
    pub batch_index: Step,

    /// Metric values
    pub values: Metrics,
}

impl MetricSample {
    pub fn training(batch_index: Step, values: Metrics) -> Self {
        Self {
            kind: StepKind::Training,
            batch_index,
            values,
        }
    }

    pub fn validation(batch_index: Step, values: Metrics) -> Self {
        Self {
            kind: StepKind::Validation,
            batch_index,
            values,
        }
    }

    /// Look up a single metric
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// One segment of training between two scheduler actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainStepResult {
    /// Batches trained in this segment
    pub batches_processed: u64,

    /// Whether the training-length limit was reached at the end of the segment
    pub limit_reached: bool,
}

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Unique checkpoint identifier
    pub uuid: CheckpointId,

    /// Progress captured in the checkpoint
    pub progress: ProgressState,

    /// Storage path
    pub path: String,

    /// Encoded size in bytes
    pub size_bytes: u64,

    /// Timestamp when checkpoint was created
    pub created_at: DateTime<Utc>,
}
