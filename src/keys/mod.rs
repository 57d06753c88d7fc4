//! API key storage.
//!
//! # Data Flow
//! ```text
//! KeyManagerConfig
//!     → KeyManager::from_config (mode string → variant)
//!     → fetch_keys() once at server construction
//!         file.rs    (JSON array of strings on local disk)
//!         secrets.rs (JSON array of strings in an AWS secret)
//!     → KeyStore (immutable, shared via Arc by every session)
//! ```
//!
//! # Design Decisions
//! - Keys are fetched exactly once; there is no reload path
//! - `KeyStore` has no mutating methods after construction
//! - `validate` is a plain set lookup, not a constant-time compare

pub mod file;
pub mod secrets;

use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::KeyManagerConfig;

pub use secrets::SecretsBackend;

pub const KEY_MANAGER_FILE: &str = "file";
pub const KEY_MANAGER_SECRETS: &str = "secrets-backend";
/// Older configs name the secrets backend after the AWS service.
pub const KEY_MANAGER_SECRETS_ALIAS: &str = "aws_sm";

/// Errors raised while populating a [`KeyStore`].
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("keys from {identifier} are not a JSON array of strings: {source}")]
    Parse {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("secrets backend lookup for {secret_id} failed: {message}")]
    Backend { secret_id: String, message: String },

    #[error("secret {0} has no string value")]
    MissingSecretString(String),

    #[error("no key manager is configured")]
    Disabled,
}

/// Source of valid API keys, selected by the `key_manager.mode` string.
#[derive(Debug, Clone)]
pub enum KeyManager {
    File { path: PathBuf },
    SecretsBackend(SecretsBackend),
    Disabled,
}

impl KeyManager {
    /// Resolve the configured mode. Unrecognized modes yield `Disabled`.
    pub fn from_config(config: &KeyManagerConfig) -> Self {
        match config.mode.as_str() {
            KEY_MANAGER_FILE => KeyManager::File {
                path: PathBuf::from(&config.identifier),
            },
            KEY_MANAGER_SECRETS | KEY_MANAGER_SECRETS_ALIAS => KeyManager::SecretsBackend(
                SecretsBackend::new(config.identifier.clone(), config.secrets.clone()),
            ),
            "" => KeyManager::Disabled,
            other => {
                tracing::warn!(mode = %other, "Unrecognized key manager mode, key manager disabled");
                KeyManager::Disabled
            }
        }
    }

    pub fn is_known_mode(mode: &str) -> bool {
        matches!(mode, KEY_MANAGER_FILE | KEY_MANAGER_SECRETS | KEY_MANAGER_SECRETS_ALIAS)
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, KeyManager::Disabled)
    }

    /// File path or secret id the keys are read from.
    pub fn identifier(&self) -> String {
        match self {
            KeyManager::File { path } => path.display().to_string(),
            KeyManager::SecretsBackend(backend) => backend.secret_id().to_string(),
            KeyManager::Disabled => String::new(),
        }
    }

    /// Fetch the full key set from the backing store.
    pub async fn fetch_keys(&self) -> Result<KeyStore, KeyError> {
        let store = match self {
            KeyManager::File { path } => file::read_keys(path).await?,
            KeyManager::SecretsBackend(backend) => backend.fetch_keys().await?,
            KeyManager::Disabled => return Err(KeyError::Disabled),
        };

        tracing::info!(
            identifier = %store.identifier(),
            key_count = store.len(),
            "API keys loaded"
        );
        Ok(store)
    }
}

/// Immutable set of valid API keys.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    identifier: String,
    keys: HashSet<String>,
}

impl KeyStore {
    pub fn new<I, S>(identifier: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifier: identifier.into(),
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true iff `key` is one of the loaded keys.
    pub fn validate(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Parse raw key material: a JSON array of strings.
pub(crate) fn parse_keys(identifier: &str, raw: &[u8]) -> Result<KeyStore, KeyError> {
    let keys: Vec<String> = serde_json::from_slice(raw).map_err(|source| KeyError::Parse {
        identifier: identifier.to_string(),
        source,
    })?;
    Ok(KeyStore::new(identifier, keys))
}
