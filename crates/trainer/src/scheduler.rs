//! Step scheduler: the boundary-driven training loop
//!
//! One task owns the scheduler and does everything in order: pull a batch,
//! train it, update progress, record metrics, fire observers, then check the
//! boundary plan. Validation and checkpointing suspend stepping while they
//! run, so there is never more than one of either in flight.
//!
//! When validation and a checkpoint fall due at the same batch, validation
//! runs first so the checkpoint reflects every validated metric.

use data_source::{Batch, DataSource, SourceEvent};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use runtime_core::{
    BoundaryPlan, Error, MetricSample, ProgressState, Result, StopListener, TrainBoundary,
    TrainStepResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use checkpoint::CheckpointManager;

use crate::{
    reduce_metrics, CallbackDispatcher, MetricsCollector, StepContext, TrainerCallback,
    TrainerSnapshot, Trial,
};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Training,
    Validating,
    Checkpointing,
    Terminated,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Training => "training",
            SchedulerState::Validating => "validating",
            SchedulerState::Checkpointing => "checkpointing",
            SchedulerState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Drives a [`Trial`] over a [`DataSource`] until a boundary says stop
pub struct StepScheduler<T, D>
where
    T: Trial,
    D: DataSource<Record = T::Record>,
{
    trial: T,
    source: D,
    checkpoints: Arc<CheckpointManager>,
    callbacks: CallbackDispatcher,
    metrics: MetricsCollector,
    progress: ProgressState,
    rng: ChaCha8Rng,
    state: SchedulerState,
    stop: Option<StopListener>,

    /// Closed segments, in order
    results: Vec<TrainStepResult>,

    /// Batches trained in the open segment
    segment_batches: u64,
}

impl<T, D> StepScheduler<T, D>
where
    T: Trial,
    D: DataSource<Record = T::Record>,
{
    /// Create an idle scheduler. `seed` seeds the trial RNG.
    pub fn new(trial: T, source: D, checkpoints: Arc<CheckpointManager>, seed: u64) -> Self {
        Self {
            trial,
            source,
            checkpoints,
            callbacks: CallbackDispatcher::new(),
            metrics: MetricsCollector::new(),
            progress: ProgressState::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            state: SchedulerState::Idle,
            stop: None,
            results: Vec::new(),
            segment_batches: 0,
        }
    }

    /// Register an observer
    pub fn with_callback(mut self, callback: Box<dyn TrainerCallback>) -> Self {
        self.callbacks.register(callback);
        self
    }

    /// Honour stop requests from `listener`
    pub fn with_stop_listener(mut self, listener: StopListener) -> Self {
        self.stop = Some(listener);
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Segments completed so far, including those closed by a fatal error
    pub fn step_results(&self) -> &[TrainStepResult] {
        &self.results
    }

    pub fn trial(&self) -> &T {
        &self.trial
    }

    pub fn checkpoints(&self) -> &Arc<CheckpointManager> {
        &self.checkpoints
    }

    /// Observer failures swallowed so far
    pub fn observer_failures(&self) -> u64 {
        self.callbacks.failures()
    }

    /// Load trial state, progress, data cursor and RNG from a checkpoint.
    ///
    /// Only allowed before the first run. Any failure is fatal: the scheduler
    /// moves to [`SchedulerState::Terminated`] and refuses to run, since the
    /// trial or source may already hold part of the checkpoint.
    pub async fn restore(&mut self, uuid: &str) -> Result<()> {
        if self.state != SchedulerState::Idle {
            return Err(Error::Internal {
                message: format!("cannot restore while {}", self.state),
            });
        }

        if let Err(e) = self.apply_checkpoint(uuid).await {
            error!(checkpoint_id = %uuid, error = %e, "Restore failed");
            self.set_state(SchedulerState::Terminated);
            return Err(e);
        }

        info!(
            checkpoint_id = %uuid,
            batch = self.progress.batches_trained,
            epoch = self.progress.epochs_trained,
            "Resuming from checkpoint"
        );
        Ok(())
    }

    async fn apply_checkpoint(&mut self, uuid: &str) -> Result<()> {
        let record = self.checkpoints.restore(uuid).await?;
        let snapshot = TrainerSnapshot::decode(uuid, &record.state_blob)?;

        // A rejected cursor leaves the source where it was
        self.source.seek(snapshot.data_cursor)?;
        self.trial.load_state(&snapshot.trial_state)?;
        self.rng = snapshot.rng;
        self.progress = record.progress;
        Ok(())
    }

    /// Train until the TRAIN limit is reached, the source is exhausted or a
    /// stop is requested.
    ///
    /// Returns the completed segments. On a fatal error the segments completed
    /// before the failure stay available through [`StepScheduler::step_results`].
    ///
    /// An epoch-unit limit is only seen on the source's epoch end, which comes
    /// after the epoch's last batch. If another boundary already closed the
    /// segment at that batch, the limit is reported as a final segment with
    /// `batches_processed == 0` and `limit_reached == true`.
    pub async fn run(&mut self, boundaries: &[TrainBoundary]) -> Result<Vec<TrainStepResult>> {
        if self.state != SchedulerState::Idle {
            return Err(Error::Internal {
                message: format!("cannot run while {}", self.state),
            });
        }
        let plan = BoundaryPlan::new(boundaries)?;

        info!(
            boundaries = ?plan.boundaries(),
            batch = self.progress.batches_trained,
            "Starting training"
        );

        match self.drive(&plan).await {
            Ok(()) => {
                self.set_state(SchedulerState::Terminated);
                info!(
                    batches = self.progress.batches_trained,
                    epochs = self.progress.epochs_trained,
                    segments = self.results.len(),
                    "Training finished"
                );
                Ok(self.results.clone())
            }
            Err(e) => {
                self.close_segment(false);
                error!(
                    batch = self.progress.batches_trained,
                    state = %self.state,
                    error = %e,
                    "Training aborted"
                );
                self.set_state(SchedulerState::Terminated);
                Err(e)
            }
        }
    }

    async fn drive(&mut self, plan: &BoundaryPlan) -> Result<()> {
        if plan.limit_reached(&self.progress) {
            info!(
                batch = self.progress.batches_trained,
                "Training limit already reached"
            );
            return Ok(());
        }
        self.set_state(SchedulerState::Training);

        loop {
            if self.stop_requested() {
                info!(batch = self.progress.batches_trained, "Stopping on request");
                self.close_segment(false);
                return Ok(());
            }

            let before = self.progress;
            let epoch_ended = match self.source.next_batch().await? {
                SourceEvent::Batch(batch) => {
                    self.train_step(&batch)?;
                    false
                }
                SourceEvent::EpochEnd => {
                    self.progress.record_epoch_end();
                    debug!(epoch = self.progress.epochs_trained, "Epoch ended");
                    true
                }
                SourceEvent::Exhausted => {
                    info!(batch = self.progress.batches_trained, "Data source exhausted");
                    self.close_segment(false);
                    return Ok(());
                }
            };

            let decision = plan.evaluate(&before, &self.progress, epoch_ended);
            if !decision.any() {
                continue;
            }

            if decision.validate {
                self.validate().await?;
            }
            if decision.checkpoint {
                self.checkpoint().await?;
            }
            self.close_segment(decision.train_limit);

            if decision.train_limit {
                return Ok(());
            }
            self.set_state(SchedulerState::Training);
        }
    }

    fn train_step(&mut self, batch: &Batch<T::Record>) -> Result<()> {
        let batch_index = self.progress.batches_trained;
        let mut ctx = StepContext {
            batch_index,
            epoch: self.progress.epochs_trained,
            rng: &mut self.rng,
        };
        let values = self.trial.train_batch(batch, &mut ctx)?;

        self.progress.record_batch(batch.len() as u64);
        self.segment_batches += 1;

        let sample = MetricSample::training(batch_index, values);
        self.metrics.push_training(sample.clone());
        self.callbacks.training_metrics(&sample);
        Ok(())
    }

    async fn validate(&mut self) -> Result<()> {
        if self.progress.validation_is_current() {
            debug!(batch = self.progress.batches_trained, "Validation already current");
            return Ok(());
        }
        self.set_state(SchedulerState::Validating);

        let batches = self.source.validation_batches().await?;
        let mut per_batch = Vec::with_capacity(batches.len());
        for batch in &batches {
            per_batch.push(self.trial.evaluate_batch(batch)?);
        }
        let reduced = reduce_metrics(&per_batch, |name| self.trial.reducer(name));

        self.progress.mark_validated();
        let sample = MetricSample::validation(self.progress.batches_trained, reduced);
        info!(
            batch = sample.batch_index,
            batches = batches.len(),
            metrics = ?sample.values,
            "Validation complete"
        );

        self.metrics.push_validation(sample.clone());
        self.callbacks.validation_metrics(&sample);
        Ok(())
    }

    async fn checkpoint(&mut self) -> Result<()> {
        if self.progress.checkpoint_is_current() {
            debug!(batch = self.progress.batches_trained, "Checkpoint already current");
            return Ok(());
        }
        self.set_state(SchedulerState::Checkpointing);

        let snapshot = TrainerSnapshot::capture(&self.trial, &self.source, &self.rng)?;
        let mut progress = self.progress;
        progress.mark_checkpointed();

        let metadata = self.checkpoints.capture(&progress, snapshot.encode()?).await?;
        self.progress = progress;

        self.callbacks.checkpoint(&metadata);
        Ok(())
    }

    fn close_segment(&mut self, limit_reached: bool) {
        if self.segment_batches == 0 && !limit_reached {
            return;
        }
        let result = TrainStepResult {
            batches_processed: self.segment_batches,
            limit_reached,
        };
        debug!(?result, "Segment closed");
        self.results.push(result);
        self.segment_batches = 0;
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|listener| listener.is_stop_requested())
            .unwrap_or(false)
    }

    fn set_state(&mut self, state: SchedulerState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Scheduler state change");
            self.state = state;
        }
    }
}
