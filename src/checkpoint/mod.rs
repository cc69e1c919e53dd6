//! # Checkpoint Store
//!
//! Durable key -> [`Checkpoint`] storage for stream read progress.
//!
//! ## Contract
//!
//! - `load` returns `Ok(None)` when nothing was ever written under the key and
//!   fails only on transport, permission or corrupt-document errors.
//! - `save` is an upsert: it creates the backing record when absent and
//!   replaces it otherwise, as a single atomic document write.
//!
//! When and with what `save` is called is decided by the consumer coordinator:
//! once per run, after every partition loop has finished, and only when the run
//! fetched at least one record.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use stream_ingest::checkpoint::{CheckpointStore, SecretCheckpointStore};
//! use stream_ingest::models::{Checkpoint, CheckpointKey, ReadCursor};
//! use stream_ingest::secrets::InMemorySecretStore;
//!
//! # tokio_test::block_on(async {
//! let store = SecretCheckpointStore::new(Arc::new(InMemorySecretStore::new()));
//! let key = CheckpointKey::new("kinesis-sequence_shard-secret");
//! assert!(store.load(&key).await.unwrap().is_none());
//!
//! let next = Checkpoint::default()
//!     .advanced(&[ReadCursor::new("shardId-000000000000", "42")], chrono::Utc::now())
//!     .unwrap();
//! store.save(&key, &next).await.unwrap();
//!
//! let loaded = store.load(&key).await.unwrap().unwrap();
//! assert_eq!(loaded.resume_marker("shardId-000000000000"), Some("42"));
//! # });
//! ```

pub mod memory;
pub mod secret;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Checkpoint, CheckpointKey};

pub use memory::InMemoryCheckpointStore;
pub use secret::SecretCheckpointStore;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Checkpoint {key} is corrupt: {message}")]
    Corrupt { key: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckpointError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Durable storage for stream checkpoints
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint stored under `key`, `Ok(None)` if absent
    async fn load(&self, key: &CheckpointKey) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Create or overwrite the checkpoint stored under `key`
    async fn save(&self, key: &CheckpointKey, checkpoint: &Checkpoint)
        -> Result<(), CheckpointError>;
}
