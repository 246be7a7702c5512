//! Error types for the training runtime

use thiserror::Error;

/// Result type alias using the runtime Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the training runtime
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Contradictory training limits: {message}")]
    ContradictoryLimits { message: String },

    #[error("Config type mismatch at '{path}': base is {base}, overlay is {overlay}")]
    ConfigTypeMismatch {
        path: String,
        base: String,
        overlay: String,
    },

    // Compute errors
    #[error("Compute step failed: {message}")]
    Compute { message: String },

    // Storage errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Storage path not found: {path}")]
    StoragePathNotFound { path: String },

    // Checkpoint errors
    #[error("Checkpoint not found: {checkpoint_id}")]
    CheckpointNotFound { checkpoint_id: String },

    #[error("Checkpoint write failed: {message}")]
    CheckpointWriteFailed { message: String },

    #[error("Checkpoint corrupted: {checkpoint_id} - {reason}")]
    CheckpointCorrupted { checkpoint_id: String, reason: String },

    #[error("Checkpoint state does not fit: {message}")]
    StateMismatch { message: String },

    // Observer errors
    #[error("Observer '{observer}' failed: {message}")]
    Observer { observer: String, message: String },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Returns true if this error must abort the current run.
    ///
    /// Observer failures are advisory and never abort a run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Observer { .. })
    }

    /// Returns true for errors that are raised before any step runs
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig { .. }
                | Error::ContradictoryLimits { .. }
                | Error::ConfigTypeMismatch { .. }
        )
    }

    /// Returns true for checkpoint storage failures
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Error::Storage { .. }
                | Error::StoragePathNotFound { .. }
                | Error::CheckpointNotFound { .. }
                | Error::CheckpointWriteFailed { .. }
                | Error::CheckpointCorrupted { .. }
                | Error::StateMismatch { .. }
        )
    }
}
