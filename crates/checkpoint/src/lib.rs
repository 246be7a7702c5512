//! Checkpoint capture and restore for the training runtime
//!
//! Encodes progress counters and an opaque trainable-state blob into a
//! versioned record, and manages records in a storage backend.

pub mod manager;
pub mod record;

pub use manager::{CheckpointManager, CheckpointManagerConfig};
pub use record::{CheckpointRecord, CHECKPOINT_MAGIC, CHECKPOINT_VERSION};
