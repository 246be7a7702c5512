//! Observer hooks fired by the scheduler
//!
//! Observers are registered when the scheduler is built and are called
//! synchronously on the scheduler task at three points: after every training
//! step, after every validation pass and after every checkpoint capture. An
//! observer that fails is logged and skipped; the run and the remaining
//! observers carry on.

use parking_lot::Mutex;
use runtime_core::{CheckpointId, CheckpointMetadata, Error, MetricSample, Result, StopSignal};
use std::sync::Arc;
use tracing::{info, warn};

/// Trait for scheduler observers
///
/// All hooks default to no-ops.
pub trait TrainerCallback: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Called after each training step
    fn on_training_metrics(&mut self, _sample: &MetricSample) -> Result<()> {
        Ok(())
    }

    /// Called after each validation pass with the reduced metrics
    fn on_validation_metrics(&mut self, _sample: &MetricSample) -> Result<()> {
        Ok(())
    }

    /// Called after each checkpoint capture
    fn on_checkpoint(&mut self, _checkpoint: &CheckpointMetadata) -> Result<()> {
        Ok(())
    }
}

/// Fans events out to registered observers
#[derive(Default)]
pub struct CallbackDispatcher {
    callbacks: Vec<Box<dyn TrainerCallback>>,
    failures: u64,
}

impl CallbackDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: Box<dyn TrainerCallback>) {
        self.callbacks.push(callback);
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Observer failures swallowed so far
    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn training_metrics(&mut self, sample: &MetricSample) {
        self.dispatch("training_metrics", |cb| cb.on_training_metrics(sample));
    }

    pub fn validation_metrics(&mut self, sample: &MetricSample) {
        self.dispatch("validation_metrics", |cb| cb.on_validation_metrics(sample));
    }

    pub fn checkpoint(&mut self, checkpoint: &CheckpointMetadata) {
        self.dispatch("checkpoint", |cb| cb.on_checkpoint(checkpoint));
    }

    fn dispatch<F>(&mut self, hook: &str, mut call: F)
    where
        F: FnMut(&mut dyn TrainerCallback) -> Result<()>,
    {
        for callback in self.callbacks.iter_mut() {
            if let Err(e) = call(callback.as_mut()) {
                self.failures += 1;
                warn!(observer = callback.name(), hook, error = %e, "Observer failed");
            }
        }
    }
}

/// Metrics seen by a [`MetricsRecorder`]
#[derive(Debug, Clone, Default)]
pub struct RecordedMetrics {
    pub training: Vec<MetricSample>,
    pub validation: Vec<MetricSample>,
}

/// Records every sample; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    inner: Arc<Mutex<RecordedMetrics>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn training(&self) -> Vec<MetricSample> {
        self.inner.lock().training.clone()
    }

    pub fn validation(&self) -> Vec<MetricSample> {
        self.inner.lock().validation.clone()
    }
}

impl TrainerCallback for MetricsRecorder {
    fn name(&self) -> &str {
        "metrics_recorder"
    }

    fn on_training_metrics(&mut self, sample: &MetricSample) -> Result<()> {
        self.inner.lock().training.push(sample.clone());
        Ok(())
    }

    fn on_validation_metrics(&mut self, sample: &MetricSample) -> Result<()> {
        self.inner.lock().validation.push(sample.clone());
        Ok(())
    }
}

/// Records checkpoint UUIDs in capture order; clones share the same list
#[derive(Debug, Clone, Default)]
pub struct CheckpointRecorder {
    uuids: Arc<Mutex<Vec<CheckpointId>>>,
}

impl CheckpointRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uuids(&self) -> Vec<CheckpointId> {
        self.uuids.lock().clone()
    }
}

impl TrainerCallback for CheckpointRecorder {
    fn name(&self) -> &str {
        "checkpoint_recorder"
    }

    fn on_checkpoint(&mut self, checkpoint: &CheckpointMetadata) -> Result<()> {
        self.uuids.lock().push(checkpoint.uuid.clone());
        Ok(())
    }
}

/// Whether smaller or larger values of the watched metric are better
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    Min,
    Max,
}

/// Requests a stop once a validation metric stops improving
///
/// The stop takes effect at the scheduler's next boundary check.
pub struct EarlyStopping {
    metric: String,
    mode: StopMode,
    patience: u32,
    min_delta: f64,
    best: Option<f64>,
    stale: u32,
    signal: StopSignal,
}

impl EarlyStopping {
    pub fn new(metric: impl Into<String>, mode: StopMode, patience: u32, signal: StopSignal) -> Self {
        Self {
            metric: metric.into(),
            mode,
            patience,
            min_delta: 0.0,
            best: None,
            stale: 0,
            signal,
        }
    }

    /// Require improvements larger than `min_delta`
    pub fn with_min_delta(mut self, min_delta: f64) -> Self {
        self.min_delta = min_delta;
        self
    }

    fn improves(&self, value: f64) -> bool {
        match (self.best, self.mode) {
            (None, _) => true,
            (Some(best), StopMode::Min) => value < best - self.min_delta,
            (Some(best), StopMode::Max) => value > best + self.min_delta,
        }
    }
}

impl TrainerCallback for EarlyStopping {
    fn name(&self) -> &str {
        "early_stopping"
    }

    fn on_validation_metrics(&mut self, sample: &MetricSample) -> Result<()> {
        let value = sample.get(&self.metric).ok_or_else(|| Error::Observer {
            observer: self.name().to_string(),
            message: format!("validation metrics have no '{}'", self.metric),
        })?;

        if self.improves(value) {
            self.best = Some(value);
            self.stale = 0;
            return Ok(());
        }

        self.stale += 1;
        if self.stale >= self.patience {
            info!(
                metric = %self.metric,
                best = self.best,
                batch = sample.batch_index,
                "No improvement, requesting early stop"
            );
            self.signal.request_stop();
        }
        Ok(())
    }
}

/// Emits a tracing event for every hook
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCallback {
    /// Log every n-th training step; 0 disables step logging
    pub training_log_every: u64,
}

impl TrainerCallback for LoggingCallback {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_training_metrics(&mut self, sample: &MetricSample) -> Result<()> {
        if self.training_log_every > 0 && (sample.batch_index + 1) % self.training_log_every == 0 {
            info!(batch = sample.batch_index, metrics = ?sample.values, "Training step");
        }
        Ok(())
    }

    fn on_validation_metrics(&mut self, sample: &MetricSample) -> Result<()> {
        info!(batch = sample.batch_index, metrics = ?sample.values, "Validation complete");
        Ok(())
    }

    fn on_checkpoint(&mut self, checkpoint: &CheckpointMetadata) -> Result<()> {
        info!(
            checkpoint_id = %checkpoint.uuid,
            batch = checkpoint.progress.batches_trained,
            "Checkpoint reported"
        );
        Ok(())
    }
}
