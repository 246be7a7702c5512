//! Trial controller: wires cluster configuration into a scheduler

use checkpoint::{CheckpointManager, CheckpointManagerConfig};
use data_source::DataSource;
use runtime_core::{
    BoundaryPlan, ClusterInfo, Result, StopListener, TrainBoundary, TrainStepResult, TrainerConfig,
};
use std::sync::Arc;
use storage::SharedStorage;
use tracing::info;

use crate::{StepScheduler, TrainerCallback, Trial};

/// Builder for [`TrialController`]
pub struct TrialControllerBuilder {
    config: TrainerConfig,
    callbacks: Vec<Box<dyn TrainerCallback>>,
    stop: Option<StopListener>,
}

impl TrialControllerBuilder {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            callbacks: Vec::new(),
            stop: None,
        }
    }

    pub fn with_callback(mut self, callback: Box<dyn TrainerCallback>) -> Self {
        self.callbacks.push(callback);
        self
    }

    pub fn with_stop_listener(mut self, listener: StopListener) -> Self {
        self.stop = Some(listener);
        self
    }

    /// Validate the configuration, build the scheduler and restore the
    /// configured checkpoint, if any. Nothing is trained here.
    pub async fn build<T, D>(
        self,
        trial: T,
        source: D,
        storage: SharedStorage,
    ) -> Result<TrialController<T, D>>
    where
        T: Trial,
        D: DataSource<Record = T::Record>,
    {
        self.config.validate()?;
        let cluster = self.config.cluster;
        let boundaries = cluster.boundaries();
        BoundaryPlan::new(&boundaries)?;

        let checkpoints = Arc::new(CheckpointManager::new(
            storage,
            CheckpointManagerConfig {
                keep_count: self.config.checkpoint.keep_count,
                ..CheckpointManagerConfig::default()
            },
        ));

        let mut scheduler = StepScheduler::new(trial, source, checkpoints, cluster.trial_seed);
        for callback in self.callbacks {
            scheduler = scheduler.with_callback(callback);
        }
        if let Some(listener) = self.stop {
            scheduler = scheduler.with_stop_listener(listener);
        }

        if let Some(uuid) = &cluster.latest_checkpoint {
            scheduler.restore(uuid).await?;
        }

        Ok(TrialController {
            cluster,
            boundaries,
            scheduler,
        })
    }
}

/// A scheduler bound to the boundaries implied by its cluster info
pub struct TrialController<T, D>
where
    T: Trial,
    D: DataSource<Record = T::Record>,
{
    cluster: ClusterInfo,
    boundaries: Vec<TrainBoundary>,
    scheduler: StepScheduler<T, D>,
}

impl<T, D> TrialController<T, D>
where
    T: Trial,
    D: DataSource<Record = T::Record>,
{
    /// Run to the configured limit, or to source exhaustion when there is none
    pub async fn run(&mut self) -> Result<Vec<TrainStepResult>> {
        info!(
            seed = self.cluster.trial_seed,
            resumed_from = ?self.cluster.latest_checkpoint,
            max_length = ?self.cluster.max_length,
            "Running trial"
        );
        self.scheduler.run(&self.boundaries).await
    }

    pub fn cluster(&self) -> &ClusterInfo {
        &self.cluster
    }

    pub fn boundaries(&self) -> &[TrainBoundary] {
        &self.boundaries
    }

    pub fn scheduler(&self) -> &StepScheduler<T, D> {
        &self.scheduler
    }

    pub fn into_scheduler(self) -> StepScheduler<T, D> {
        self.scheduler
    }
}
