//! Storage - checkpoint sinks for the training runtime
//!
//! Provides async storage operations keyed by relative path:
//! - Local filesystem with atomic writes
//! - In-memory, with fault injection for tests
//!
//! # Example
//!
//! ```no_run
//! use storage::{StorageBackend, LocalStorage};
//! use bytes::Bytes;
//!
//! # async fn example() -> runtime_core::Result<()> {
//! let storage = LocalStorage::new("/tmp/checkpoints");
//! storage.write("checkpoints/4b7f.ckpt", Bytes::from(vec![1, 2, 3])).await?;
//! let data = storage.read("checkpoints/4b7f.ckpt").await?;
//! # Ok(())
//! # }
//! ```

mod backend;
mod local;
mod memory;

pub use backend::{SharedStorage, StorageBackend};
pub use local::LocalStorage;
pub use memory::InMemoryStorage;
