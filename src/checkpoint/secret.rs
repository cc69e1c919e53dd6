//! Checkpoint storage inside a secret document.
//!
//! The checkpoint fields share the document with unrelated keys (the stream and
//! bucket names live in the same secret), so a save rewrites only the
//! checkpoint fields and carries every other key over unchanged.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{CheckpointError, CheckpointStore};
use crate::constants::checkpoint_fields;
use crate::models::{Checkpoint, CheckpointKey};
use crate::secrets::{SecretDocument, SecretStore};

const CHECKPOINT_FIELDS: [&str; 4] = [
    checkpoint_fields::LAST_PARTITION_ID,
    checkpoint_fields::LAST_SEQUENCE_MARKER,
    checkpoint_fields::PARTITIONS,
    checkpoint_fields::UPDATED_AT,
];

pub struct SecretCheckpointStore {
    secrets: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for SecretCheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCheckpointStore").finish()
    }
}

impl SecretCheckpointStore {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    fn decode(key: &CheckpointKey, document: &SecretDocument) -> Result<Checkpoint, CheckpointError> {
        let fields: SecretDocument = document
            .iter()
            .filter(|(name, _)| CHECKPOINT_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| CheckpointError::corrupt(key.as_str(), e.to_string()))
    }
}

#[async_trait]
impl CheckpointStore for SecretCheckpointStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn load(&self, key: &CheckpointKey) -> Result<Option<Checkpoint>, CheckpointError> {
        let document = self
            .secrets
            .get_secret(key.as_str())
            .await
            .map_err(|e| CheckpointError::unavailable(e.to_string()))?;

        let Some(document) = document else {
            debug!("No checkpoint document found, cold start");
            return Ok(None);
        };

        let checkpoint = Self::decode(key, &document)?;
        if checkpoint.is_empty() {
            debug!("Checkpoint document holds no position, cold start");
            return Ok(None);
        }

        info!(
            last_partition_id = ?checkpoint.last_partition_id,
            last_sequence_marker = ?checkpoint.last_sequence_marker,
            tracked_partitions = checkpoint.partitions.len(),
            "Loaded checkpoint"
        );
        Ok(Some(checkpoint))
    }

    #[instrument(skip(self, checkpoint), fields(key = %key))]
    async fn save(
        &self,
        key: &CheckpointKey,
        checkpoint: &Checkpoint,
    ) -> Result<(), CheckpointError> {
        let mut document = self
            .secrets
            .get_secret(key.as_str())
            .await
            .map_err(|e| CheckpointError::unavailable(e.to_string()))?
            .unwrap_or_default();

        for field in CHECKPOINT_FIELDS {
            document.remove(field);
        }
        match serde_json::to_value(checkpoint)? {
            Value::Object(fields) => document.extend(fields),
            other => {
                return Err(CheckpointError::corrupt(
                    key.as_str(),
                    format!("checkpoint serialized to non-object {other}"),
                ))
            }
        }

        self.secrets
            .put_secret(key.as_str(), &document)
            .await
            .map_err(|e| CheckpointError::unavailable(e.to_string()))?;

        info!(
            last_partition_id = ?checkpoint.last_partition_id,
            last_sequence_marker = ?checkpoint.last_sequence_marker,
            "Checkpoint saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReadCursor;
    use crate::secrets::InMemorySecretStore;
    use chrono::Utc;
    use serde_json::json;

    fn seeded_store() -> Arc<InMemorySecretStore> {
        let mut doc = SecretDocument::new();
        doc.insert("KINESIS_STREAM_NAME".into(), json!("orders"));
        doc.insert("S3_BUCKET_NAME".into(), json!("lake"));
        Arc::new(InMemorySecretStore::new().with_secret("ingest", doc))
    }

    #[tokio::test]
    async fn test_document_without_position_is_absent() {
        let secrets = seeded_store();
        let store = SecretCheckpointStore::new(secrets);
        assert!(store.load(&CheckpointKey::new("ingest")).await.unwrap().is_none());
        assert!(store.load(&CheckpointKey::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_preserves_unrelated_keys() {
        let secrets = seeded_store();
        let store = SecretCheckpointStore::new(secrets.clone());
        let key = CheckpointKey::new("ingest");

        let checkpoint = Checkpoint::default()
            .advanced(&[ReadCursor::new("shard-a", "3")], Utc::now())
            .unwrap();
        store.save(&key, &checkpoint).await.unwrap();

        let raw = secrets.snapshot("ingest").unwrap();
        assert_eq!(raw["KINESIS_STREAM_NAME"], "orders");
        assert_eq!(raw["last_shard_id"], "shard-a");
        assert_eq!(raw["last_shard_sequence"], "3");

        let loaded = store.load(&key).await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);
    }

    #[tokio::test]
    async fn test_save_creates_missing_document() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = SecretCheckpointStore::new(secrets.clone());
        let key = CheckpointKey::new("fresh");

        let checkpoint = Checkpoint::default()
            .advanced(&[ReadCursor::new("shard-a", "1")], Utc::now())
            .unwrap();
        store.save(&key, &checkpoint).await.unwrap();

        assert!(secrets.snapshot("fresh").is_some());
    }

    #[tokio::test]
    async fn test_outage_is_unavailable() {
        let secrets = seeded_store();
        secrets.set_unavailable(true);
        let store = SecretCheckpointStore::new(secrets);

        assert!(matches!(
            store.load(&CheckpointKey::new("ingest")).await,
            Err(CheckpointError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_partition_map() {
        let mut doc = SecretDocument::new();
        doc.insert("partitions".into(), json!(["not", "a", "map"]));
        let secrets = Arc::new(InMemorySecretStore::new().with_secret("ingest", doc));
        let store = SecretCheckpointStore::new(secrets);

        assert!(matches!(
            store.load(&CheckpointKey::new("ingest")).await,
            Err(CheckpointError::Corrupt { .. })
        ));
    }
}
