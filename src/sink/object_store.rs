use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::{ObjectStore, ObjectStoreError};

/// Object store held in memory, keyed by `(bucket, key)`
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), Bytes>,
    unavailable: AtomicBool,
    failing_prefixes: RwLock<Vec<String>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Reject every put whose key starts with `prefix`
    pub fn fail_prefix(&self, prefix: impl Into<String>) {
        self.failing_prefixes.write().push(prefix.into());
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Keys stored in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::unavailable("simulated outage"));
        }
        let failing = self
            .failing_prefixes
            .read()
            .iter()
            .find(|prefix| key.starts_with(prefix.as_str()))
            .cloned();
        if let Some(prefix) = failing {
            return Err(ObjectStoreError::unavailable(format!(
                "simulated outage under {prefix}"
            )));
        }
        self.objects
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }
}

/// Object store on the local filesystem: `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    root: PathBuf,
}

impl LocalFsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.join(bucket).join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn put(&self, bucket: &str, key: &str, body: Bytes) -> Result<(), ObjectStoreError> {
        if key.split('/').any(|segment| segment == "..") {
            return Err(ObjectStoreError::rejected(bucket, key, "key escapes the bucket"));
        }

        let path = self.path_for(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ObjectStoreError::unavailable(format!("{}: {e}", parent.display())))?;
        }

        let mut temp = path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, &body)
            .await
            .map_err(|e| ObjectStoreError::unavailable(format!("{}: {e}", temp.display())))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| ObjectStoreError::unavailable(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), bytes = body.len(), "Object written");
        Ok(())
    }
}
