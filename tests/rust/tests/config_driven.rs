//! Configuration files with overlays driving a full trial

use anyhow::Result;
use runtime_core::{BoundaryUnit, Error, TrainerConfig};
use std::sync::Arc;
use storage::InMemoryStorage;
use tempfile::TempDir;
use trainer::linear::{ones_source, LinearHparams, LinearTrial};
use trainer::{MetricsRecorder, TrialControllerBuilder};

const BASE: &str = r#"{
    "cluster": {
        "hparams": {"hidden_size": 2, "learning_rate": 0.5, "global_batch_size": 4},
        "trial_seed": 17,
        "max_length": {"batches": 100},
        "min_validation_period": {"batches": 50}
    },
    "checkpoint": {"keep_count": 3}
}"#;

#[tokio::test]
async fn test_overlay_file_replaces_leaves() -> Result<()> {
    let dir = TempDir::new()?;
    let base = dir.path().join("config.json");
    let overlay = dir.path().join("overlay.json");
    std::fs::write(&base, BASE)?;
    std::fs::write(
        &overlay,
        r#"{"cluster": {"hparams": {"learning_rate": 0.25}, "max_length": {"batches": 40}}}"#,
    )?;

    let config = TrainerConfig::from_json_file(&base, Some(overlay.as_path()))?;
    assert_eq!(config.cluster.max_length, Some(BoundaryUnit::Batches(40)));
    assert_eq!(config.checkpoint.keep_count, 3);

    let hparams: LinearHparams = config.cluster.hparams()?;
    assert_eq!(hparams.learning_rate, 0.25);
    assert_eq!(hparams.hidden_size, 2);

    let trial = LinearTrial::new(hparams.clone(), config.cluster.trial_seed)?;
    let source = ones_source(&hparams, 32, 8)?;
    let recorder = MetricsRecorder::new();
    let mut controller = TrialControllerBuilder::new(config)
        .with_callback(Box::new(recorder.clone()))
        .build(trial, source, Arc::new(InMemoryStorage::new()))
        .await?;

    let results = controller.run().await?;
    assert_eq!(results.iter().map(|r| r.batches_processed).sum::<u64>(), 40);
    assert_eq!(recorder.training().len(), 40);
    assert!(recorder.validation().is_empty());
    Ok(())
}

#[test]
fn test_overlay_type_mismatch_is_rejected() {
    let err = TrainerConfig::from_json_str_with_overlay(
        BASE,
        r#"{"cluster": {"hparams": {"hidden_size": "two"}}}"#,
    )
    .unwrap_err();

    match err {
        Error::ConfigTypeMismatch { path, .. } => assert_eq!(path, "cluster.hparams.hidden_size"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_boundary_unit_is_config_error() {
    let err = TrainerConfig::from_json_str(
        r#"{"cluster": {"max_length": {"minutes": 5}}}"#,
    )
    .unwrap_err();
    assert!(err.is_config_error());
}
