//! Pause/resume equivalence on a real filesystem
//!
//! Trial A trains 100 batches and checkpoints once. Trial B resumes from that
//! checkpoint and trains to 200 with checkpointing effectively disabled.
//! Trial C trains 200 batches from scratch. A followed by B must report the
//! same metrics as C, index for index.

use anyhow::Result;
use data_source::InMemoryDataSource;
use runtime_core::{BoundaryUnit, ClusterInfo, TrainerConfig};
use serde_json::json;
use std::sync::Arc;
use storage::LocalStorage;
use tempfile::TempDir;
use trainer::linear::{LinearHparams, LinearRecord, LinearTrial, LOSS, MSE};
use trainer::{CheckpointRecorder, MetricsRecorder, TrialControllerBuilder};

const SEED: u64 = 17;

fn cluster(
    max_batches: u64,
    checkpoint_period: u64,
    latest_checkpoint: Option<String>,
) -> ClusterInfo {
    ClusterInfo {
        hparams: json!({
            "hidden_size": 2,
            "learning_rate": 0.5,
            "global_batch_size": 4,
            "lr_decay": 0.99
        }),
        trial_seed: SEED,
        latest_checkpoint,
        max_length: Some(BoundaryUnit::Batches(max_batches)),
        min_validation_period: Some(BoundaryUnit::Batches(100)),
        min_checkpoint_period: Some(BoundaryUnit::Batches(checkpoint_period)),
    }
}

/// Shuffled records with varied inputs so data order shows up in the loss
fn source(hparams: &LinearHparams) -> Result<InMemoryDataSource<LinearRecord>> {
    let records: Vec<LinearRecord> = (0..36)
        .map(|i| {
            let x = 0.5 + (i % 4) as f64 * 0.25;
            LinearRecord { x, y: 2.0 * x }
        })
        .collect();
    let validation = records[..8].to_vec();
    Ok(InMemoryDataSource::new(records, validation, hparams.global_batch_size)?.with_shuffle(SEED))
}

struct Outcome {
    metrics: MetricsRecorder,
    checkpoints: Vec<String>,
    batches_trained: u64,
}

async fn run_trial(dir: &TempDir, cluster: ClusterInfo) -> Result<Outcome> {
    let config = TrainerConfig {
        cluster,
        ..TrainerConfig::default()
    };
    let hparams: LinearHparams = config.cluster.hparams()?;
    let trial = LinearTrial::from_cluster(&config.cluster)?;
    let source = source(&hparams)?;

    let metrics = MetricsRecorder::new();
    let checkpoints = CheckpointRecorder::new();
    let mut controller = TrialControllerBuilder::new(config)
        .with_callback(Box::new(metrics.clone()))
        .with_callback(Box::new(checkpoints.clone()))
        .build(trial, source, Arc::new(LocalStorage::new(dir.path())))
        .await?;

    let results = controller.run().await?;
    assert!(results.last().map(|r| r.limit_reached).unwrap_or(false));

    Ok(Outcome {
        metrics,
        checkpoints: checkpoints.uuids(),
        batches_trained: controller.scheduler().progress().batches_trained,
    })
}

#[tokio::test]
async fn test_resume_matches_uninterrupted_run() -> Result<()> {
    let dir = TempDir::new()?;

    let a = run_trial(&dir, cluster(100, 100, None)).await?;
    assert_eq!(a.checkpoints.len(), 1);
    assert_eq!(a.batches_trained, 100);

    let b = run_trial(&dir, cluster(200, u64::MAX, Some(a.checkpoints[0].clone()))).await?;
    assert!(b.checkpoints.is_empty());
    assert_eq!(b.batches_trained, 200);

    let scratch = TempDir::new()?;
    let c = run_trial(&scratch, cluster(200, u64::MAX, None)).await?;

    let a_train = a.metrics.training();
    let b_train = b.metrics.training();
    let c_train = c.metrics.training();
    assert_eq!(a_train.len(), 100);
    assert_eq!(b_train.len(), 100);
    assert_eq!(c_train.len(), 200);

    for (i, sample) in a_train.iter().enumerate() {
        assert_eq!(sample, &c_train[i], "training metrics differ at batch {}", i);
    }
    for (i, sample) in b_train.iter().enumerate() {
        assert_eq!(sample, &c_train[100 + i], "training metrics differ at batch {}", 100 + i);
        assert_eq!(sample.batch_index, 100 + i as u64);
    }

    let a_val = a.metrics.validation();
    let b_val = b.metrics.validation();
    let c_val = c.metrics.validation();
    assert_eq!(c_val.len(), 2);
    assert_eq!(a_val, vec![c_val[0].clone()]);
    assert_eq!(b_val, vec![c_val[1].clone()]);
    assert!(c_val.iter().all(|s| s.get(MSE).is_some()));
    assert!(c_train.iter().all(|s| s.get(LOSS).is_some()));

    Ok(())
}

#[tokio::test]
async fn test_resume_from_missing_checkpoint_fails() -> Result<()> {
    let dir = TempDir::new()?;
    let result = run_trial(&dir, cluster(10, 5, Some("0000-missing".to_string()))).await;

    let err = match result {
        Ok(_) => anyhow::bail!("resume from a missing checkpoint must fail"),
        Err(e) => e,
    };
    let err = err.downcast::<runtime_core::Error>()?;
    assert!(matches!(err, runtime_core::Error::CheckpointNotFound { .. }));
    Ok(())
}
