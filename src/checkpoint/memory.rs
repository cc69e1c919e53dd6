use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{CheckpointError, CheckpointStore};
use crate::models::{Checkpoint, CheckpointKey};

/// In-memory checkpoint store.
///
/// Counts saves and can simulate an outage on load or save, which is what the
/// consumer's commit-policy tests need.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<CheckpointKey, Checkpoint>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    save_count: AtomicUsize,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_checkpoint(self, key: CheckpointKey, checkpoint: Checkpoint) -> Self {
        self.checkpoints.write().insert(key, checkpoint);
        self
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves since construction
    pub fn save_count(&self) -> usize {
        self.save_count.load(Ordering::SeqCst)
    }

    pub fn get(&self, key: &CheckpointKey) -> Option<Checkpoint> {
        self.checkpoints.read().get(key).cloned()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, key: &CheckpointKey) -> Result<Option<Checkpoint>, CheckpointError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(CheckpointError::unavailable("simulated load failure"));
        }
        Ok(self.checkpoints.read().get(key).cloned())
    }

    async fn save(
        &self,
        key: &CheckpointKey,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(CheckpointError::unavailable("simulated save failure"));
        }
        self.checkpoints
            .write()
            .insert(key.clone(), checkpoint.clone());
        self.save_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
