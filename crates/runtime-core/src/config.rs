//! Trainer configuration types

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::{merge_values, BoundaryUnit, CheckpointId, Error, Result, TrainBoundary};

/// Main trainer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Values supplied by the cluster at process start
    pub cluster: ClusterInfo,

    /// Checkpoint settings
    pub checkpoint: CheckpointConfig,
}

impl TrainerConfig {
    /// Parse a configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_value(parse_document("configuration", json)?)
    }

    /// Parse a configuration document with an overlay merged onto it.
    ///
    /// The overlay may only replace leaves of the base document.
    pub fn from_json_str_with_overlay(base: &str, overlay: &str) -> Result<Self> {
        let base = parse_document("configuration", base)?;
        let overlay = parse_document("overlay", overlay)?;
        Self::from_value(merge_values(&base, &overlay)?)
    }

    /// Load a configuration file, optionally merging an overlay file
    pub fn from_json_file(path: impl AsRef<Path>, overlay: Option<&Path>) -> Result<Self> {
        let base = std::fs::read_to_string(path.as_ref())?;
        match overlay {
            Some(overlay) => {
                let overlay = std::fs::read_to_string(overlay)?;
                Self::from_json_str_with_overlay(&base, &overlay)
            }
            None => Self::from_json_str(&base),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint.keep_count == 0 {
            return Err(Error::InvalidConfig {
                message: "checkpoint.keep_count must be at least 1".to_string(),
            });
        }
        if let Some(uuid) = &self.cluster.latest_checkpoint {
            if uuid.trim().is_empty() {
                return Err(Error::InvalidConfig {
                    message: "cluster.latest_checkpoint must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn parse_document(what: &str, json: &str) -> Result<Value> {
    serde_json::from_str(json).map_err(|e| Error::InvalidConfig {
        message: format!("malformed {} document: {}", what, e),
    })
}

/// Values the cluster hands to a trial at process start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    /// Hyperparameters as a free-form tree
    pub hparams: Value,

    /// Seed for every source of randomness in the trial
    pub trial_seed: u64,

    /// Checkpoint to resume from
    pub latest_checkpoint: Option<CheckpointId>,

    /// Training length; absent means run until the data source is exhausted
    pub max_length: Option<BoundaryUnit>,

    /// Validation period
    pub min_validation_period: Option<BoundaryUnit>,

    /// Checkpoint period
    pub min_checkpoint_period: Option<BoundaryUnit>,
}

impl Default for ClusterInfo {
    fn default() -> Self {
        Self {
            hparams: Value::Object(Default::default()),
            trial_seed: 0,
            latest_checkpoint: None,
            max_length: None,
            min_validation_period: None,
            min_checkpoint_period: None,
        }
    }
}

impl ClusterInfo {
    /// Decode the hyperparameter tree into a typed struct
    pub fn hparams<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.hparams.clone()).map_err(|e| Error::InvalidConfig {
            message: format!("invalid hyperparameters: {}", e),
        })
    }

    /// The boundary list implied by the configured periods and limit
    pub fn boundaries(&self) -> Vec<TrainBoundary> {
        let mut boundaries = Vec::with_capacity(3);
        if let Some(unit) = self.min_checkpoint_period {
            boundaries.push(TrainBoundary::checkpoint(unit));
        }
        if let Some(unit) = self.min_validation_period {
            boundaries.push(TrainBoundary::validate(unit));
        }
        if let Some(unit) = self.max_length {
            boundaries.push(TrainBoundary::train(unit));
        }
        boundaries
    }
}

/// Checkpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Base path for checkpoint storage
    pub base_path: String,

    /// Number of checkpoints to keep
    pub keep_count: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            base_path: "./checkpoints".to_string(),
            keep_count: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundaryKind;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = TrainerConfig::default();
        assert_eq!(config.checkpoint.keep_count, 5);
        assert!(config.cluster.latest_checkpoint.is_none());
        assert!(config.cluster.boundaries().is_empty());
    }

    #[test]
    fn test_parse_cluster_info() {
        let config = TrainerConfig::from_json_str(
            r#"{
                "cluster": {
                    "hparams": {"hidden_size": 2, "learning_rate": 0.5},
                    "trial_seed": 17,
                    "max_length": {"batches": 200},
                    "min_validation_period": {"batches": 100},
                    "min_checkpoint_period": {"epochs": 1}
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.cluster.trial_seed, 17);
        let kinds: Vec<_> = config.cluster.boundaries().iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BoundaryKind::Checkpoint,
                BoundaryKind::Validate,
                BoundaryKind::Train
            ]
        );
        assert_eq!(config.cluster.max_length, Some(BoundaryUnit::Batches(200)));
    }

    #[test]
    fn test_bad_unit_is_config_error() {
        let err = TrainerConfig::from_json_str(r#"{"cluster": {"max_length": {"steps": 10}}}"#)
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_malformed_document_is_config_error() {
        let err = TrainerConfig::from_json_str(r#"{"cluster": {"trial_seed": 17"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
        assert!(err.is_config_error());

        let err = TrainerConfig::from_json_str_with_overlay("{}", "{not json").unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_keep_count_rejected() {
        let err = TrainerConfig::from_json_str(r#"{"checkpoint": {"keep_count": 0}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_overlay_replaces_leaves() {
        let base = r#"{"cluster": {"trial_seed": 1, "hparams": {"learning_rate": 0.1}}}"#;
        let overlay = r#"{"cluster": {"hparams": {"learning_rate": 0.5}}}"#;
        let config = TrainerConfig::from_json_str_with_overlay(base, overlay).unwrap();

        assert_eq!(config.cluster.trial_seed, 1);
        assert_eq!(config.cluster.hparams, json!({"learning_rate": 0.5}));
    }

    #[test]
    fn test_typed_hparams() {
        #[derive(Deserialize)]
        struct Hparams {
            hidden_size: usize,
        }

        let cluster = ClusterInfo {
            hparams: json!({"hidden_size": 2}),
            ..Default::default()
        };
        let hparams: Hparams = cluster.hparams().unwrap();
        assert_eq!(hparams.hidden_size, 2);

        let cluster = ClusterInfo {
            hparams: json!({"hidden_size": "two"}),
            ..Default::default()
        };
        assert!(cluster.hparams::<Hparams>().is_err());
    }
}
