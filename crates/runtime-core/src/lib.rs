//! Runtime Core - Foundation for the training-loop orchestration runtime
//!
//! Provides the shared types, boundary evaluation, error handling and
//! configuration used by the scheduler, checkpoint and storage crates.

pub mod boundary;
pub mod config;
pub mod error;
pub mod idle;
pub mod merge;
pub mod progress;
pub mod signal;
pub mod types;

pub use boundary::{BoundaryDecision, BoundaryPlan};
pub use config::{CheckpointConfig, ClusterInfo, TrainerConfig};
pub use error::{Error, Result};
pub use idle::{is_idle, ActivitySample, IdleMode};
pub use merge::merge_values;
pub use progress::ProgressState;
pub use signal::{StopListener, StopSignal};
pub use types::*;
