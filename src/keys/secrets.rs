//! Keys stored as a JSON array in an AWS Secrets Manager secret.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_secretsmanager::config::Credentials;
use aws_sdk_secretsmanager::error::DisplayErrorContext;
use aws_sdk_secretsmanager::Client;

use crate::config::SecretsConfig;
use crate::keys::{parse_keys, KeyError, KeyStore};

/// Secrets Manager lookup for a single secret id.
#[derive(Debug, Clone)]
pub struct SecretsBackend {
    secret_id: String,
    settings: SecretsConfig,
}

impl SecretsBackend {
    pub fn new(secret_id: String, settings: SecretsConfig) -> Self {
        Self { secret_id, settings }
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }

    async fn client(&self) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = &self.settings.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(access_key), Some(secret_key)) =
            (&self.settings.access_key_id, &self.settings.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "ws-auth-proxy",
            ));
        }
        if let Some(endpoint) = &self.settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }

        Client::new(&loader.load().await)
    }

    /// Fetch the secret and parse its string value as the key set.
    pub async fn fetch_keys(&self) -> Result<KeyStore, KeyError> {
        let output = self
            .client()
            .await
            .get_secret_value()
            .secret_id(&self.secret_id)
            .send()
            .await
            .map_err(|e| KeyError::Backend {
                secret_id: self.secret_id.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let secret = output
            .secret_string()
            .ok_or_else(|| KeyError::MissingSecretString(self.secret_id.clone()))?;

        parse_keys(&self.secret_id, secret.as_bytes())
    }
}
