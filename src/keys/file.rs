//! Keys stored as a JSON array in a local file.

use std::path::Path;

use crate::keys::{parse_keys, KeyError, KeyStore};

/// Read and parse the key file at `path`.
pub async fn read_keys(path: &Path) -> Result<KeyStore, KeyError> {
    let raw = tokio::fs::read(path).await.map_err(|source| KeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_keys(&path.display().to_string(), &raw)
}
