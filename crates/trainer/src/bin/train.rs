//! Trainer binary entry point
//!
//! Runs the reference linear trial against local checkpoint storage.
//!
//! Usage: strata-train <config.json> [overlay.json]

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use runtime_core::{StopSignal, TrainerConfig};
use storage::LocalStorage;
use trainer::linear::{ones_source, LinearHparams, LinearTrial};
use trainer::{CheckpointRecorder, LoggingCallback, TrialControllerBuilder};

/// Training records per epoch
const TRAIN_RECORDS: usize = 1024;

/// Validation records
const VALIDATION_RECORDS: usize = 64;

/// Epoch cap when no training limit is configured
const MAX_EPOCHS: u64 = 100;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trainer=info,checkpoint=info,runtime_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let config_path: PathBuf = args
        .next()
        .ok_or("usage: strata-train <config.json> [overlay.json]")?
        .into();
    let overlay_path: Option<PathBuf> = args.next().map(Into::into);

    let config = TrainerConfig::from_json_file(&config_path, overlay_path.as_deref())?;
    tracing::info!(config = %config_path.display(), "Loaded configuration");

    let hparams: LinearHparams = config.cluster.hparams()?;
    let trial = LinearTrial::new(hparams.clone(), config.cluster.trial_seed)?;
    let source = ones_source(&hparams, TRAIN_RECORDS, VALIDATION_RECORDS)?.with_max_epochs(MAX_EPOCHS);
    let storage = Arc::new(LocalStorage::new(&config.checkpoint.base_path));

    let (signal, listener) = StopSignal::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.request_stop();
        }
    });

    let recorder = CheckpointRecorder::new();
    let mut controller = TrialControllerBuilder::new(config)
        .with_callback(Box::new(LoggingCallback {
            training_log_every: 100,
        }))
        .with_callback(Box::new(recorder.clone()))
        .with_stop_listener(listener)
        .build(trial, source, storage)
        .await?;

    let results = controller.run().await?;

    for (i, result) in results.iter().enumerate() {
        println!(
            "segment {}: {} batches, limit reached: {}",
            i, result.batches_processed, result.limit_reached
        );
    }
    for uuid in recorder.uuids() {
        println!("checkpoint {}", uuid);
    }

    Ok(())
}
