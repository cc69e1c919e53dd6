//! AWS Secrets Manager backed [`SecretStore`].

use async_trait::async_trait;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;
use tracing::{info, warn};

use super::{parse_document, SecretDocument, SecretError, SecretStore};

#[derive(Debug, Clone)]
pub struct SecretsManagerStore {
    client: Client,
}

impl SecretsManagerStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl SecretStore for SecretsManagerStore {
    async fn get_secret(&self, name: &str) -> Result<Option<SecretDocument>, SecretError> {
        let response = match self.client.get_secret_value().secret_id(name).send().await {
            Ok(response) => response,
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception())
                {
                    return Ok(None);
                }
                return Err(SecretError::unavailable(
                    name,
                    DisplayErrorContext(&err).to_string(),
                ));
            }
        };

        if let Some(raw) = response.secret_string() {
            return parse_document(name, raw).map(Some);
        }
        if let Some(blob) = response.secret_binary() {
            let raw = String::from_utf8(blob.as_ref().to_vec())
                .map_err(|e| SecretError::malformed(name, e.to_string()))?;
            return parse_document(name, &raw).map(Some);
        }
        Ok(Some(SecretDocument::new()))
    }

    async fn put_secret(&self, name: &str, document: &SecretDocument) -> Result<(), SecretError> {
        let body = serde_json::to_string(document)
            .map_err(|e| SecretError::malformed(name, e.to_string()))?;

        match self
            .client
            .put_secret_value()
            .secret_id(name)
            .secret_string(body.clone())
            .send()
            .await
        {
            Ok(_) => {
                info!(secret = %name, "Secret value updated");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception()) =>
            {
                warn!(secret = %name, "Secret not found, creating it");
                self.client
                    .create_secret()
                    .name(name)
                    .secret_string(body)
                    .send()
                    .await
                    .map_err(|e| {
                        SecretError::unavailable(name, DisplayErrorContext(&e).to_string())
                    })?;
                Ok(())
            }
            Err(err) => Err(SecretError::unavailable(
                name,
                DisplayErrorContext(&err).to_string(),
            )),
        }
    }
}
