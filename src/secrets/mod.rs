//! # Secret Store
//!
//! Named JSON documents holding run configuration (stream and bucket names) and,
//! by default, the checkpoint. Documents are read and written whole so that a
//! put is atomic from the caller's perspective.

pub mod file;
pub mod memory;

#[cfg(feature = "aws")]
pub mod secrets_manager;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use file::FileSecretStore;
pub use memory::InMemorySecretStore;

#[cfg(feature = "aws")]
pub use secrets_manager::SecretsManagerStore;

/// A secret document: a flat or nested JSON object
pub type SecretDocument = Map<String, Value>;

/// Errors raised by secret stores
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret store unavailable while accessing {name}: {message}")]
    Unavailable { name: String, message: String },

    #[error("Secret {name} is not a JSON object: {message}")]
    Malformed { name: String, message: String },
}

impl SecretError {
    pub fn unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unavailable {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn malformed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Parse a secret string into a document
pub fn parse_document(name: &str, raw: &str) -> Result<SecretDocument, SecretError> {
    if raw.trim().is_empty() {
        return Ok(SecretDocument::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SecretError::malformed(
            name,
            format!("expected an object, found {other}"),
        )),
        Err(e) => Err(SecretError::malformed(name, e.to_string())),
    }
}

/// Store of named secret documents
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a document; `Ok(None)` when the secret does not exist
    async fn get_secret(&self, name: &str) -> Result<Option<SecretDocument>, SecretError>;

    /// Create or replace a document
    async fn put_secret(&self, name: &str, document: &SecretDocument) -> Result<(), SecretError>;
}
