use async_trait::async_trait;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{parse_document, SecretDocument, SecretError, SecretStore};

/// Secret store backed by one JSON file per secret in a directory.
///
/// Writes go to a temporary sibling file that is renamed over the target, so a
/// reader never observes a partially written document.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    directory: PathBuf,
}

impl FileSecretStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn secret_path(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.directory.join(format!("{file_name}.json"))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret(&self, name: &str) -> Result<Option<SecretDocument>, SecretError> {
        let path = self.secret_path(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => parse_document(name, &raw).map(Some),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(SecretError::unavailable(name, e.to_string())),
        }
    }

    async fn put_secret(&self, name: &str, document: &SecretDocument) -> Result<(), SecretError> {
        let path = self.secret_path(name);
        let temp_path = path.with_extension("json.tmp");

        let body = serde_json::to_vec_pretty(document)
            .map_err(|e| SecretError::malformed(name, e.to_string()))?;

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| SecretError::unavailable(name, e.to_string()))?;
        tokio::fs::write(&temp_path, body)
            .await
            .map_err(|e| SecretError::unavailable(name, e.to_string()))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| SecretError::unavailable(name, e.to_string()))?;

        debug!(secret = %name, path = %path.display(), "Secret document written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_secret_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path());
        assert!(store.get_secret("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSecretStore::new(dir.path().join("nested").join("secrets"));

        let mut doc = SecretDocument::new();
        doc.insert("KINESIS_STREAM_NAME".into(), json!("orders"));
        store.put_secret("team/ingest", &doc).await.unwrap();

        let loaded = store.get_secret("team/ingest").await.unwrap().unwrap();
        assert_eq!(loaded, doc);
        assert!(store.directory().join("team_ingest.json").exists());
        assert!(!store.directory().join("team_ingest.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_document_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("cfg.json"), "not json").unwrap();
        let store = FileSecretStore::new(dir.path());

        assert!(matches!(
            store.get_secret("cfg").await,
            Err(SecretError::Malformed { .. })
        ));
    }
}
