//! Trainer - boundary-driven training loop
//!
//! The [`StepScheduler`] pulls batches from a data source, hands them to a
//! [`Trial`], and decides after every batch whether a validation pass, a
//! checkpoint or termination is due. Checkpoints capture everything needed to
//! resume with identical metrics: trial state, data cursor and RNG state.

pub mod callback;
pub mod controller;
pub mod linear;
pub mod metrics;
pub mod scheduler;
pub mod snapshot;
pub mod trial;

pub use callback::{
    CallbackDispatcher, CheckpointRecorder, EarlyStopping, LoggingCallback, MetricsRecorder,
    StopMode, TrainerCallback,
};
pub use controller::{TrialController, TrialControllerBuilder};
pub use metrics::{reduce_metrics, MetricsCollector, Reducer};
pub use scheduler::{SchedulerState, StepScheduler};
pub use snapshot::TrainerSnapshot;
pub use trial::{StepContext, Trial};
