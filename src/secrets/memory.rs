use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{SecretDocument, SecretError, SecretStore};

/// Process-local secret store for tests and local runs
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, SecretDocument>>,
    unavailable: AtomicBool,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a secret document
    pub fn with_secret(self, name: impl Into<String>, document: SecretDocument) -> Self {
        self.secrets.write().insert(name.into(), document);
        self
    }

    /// Simulate an outage: every call fails until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn snapshot(&self, name: &str) -> Option<SecretDocument> {
        self.secrets.read().get(name).cloned()
    }

    fn check_available(&self, name: &str) -> Result<(), SecretError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SecretError::unavailable(name, "simulated outage"));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(&self, name: &str) -> Result<Option<SecretDocument>, SecretError> {
        self.check_available(name)?;
        Ok(self.secrets.read().get(name).cloned())
    }

    async fn put_secret(&self, name: &str, document: &SecretDocument) -> Result<(), SecretError> {
        self.check_available(name)?;
        self.secrets
            .write()
            .insert(name.to_string(), document.clone());
        Ok(())
    }
}
