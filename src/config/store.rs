//! Durable persistence of the target list.
//!
//! The in-memory pool is the source of truth: every successful admin
//! mutation serializes the pool's current URL list together with the
//! immutable proxy settings. The file on disk is never re-read.

use std::path::PathBuf;

use crate::config::schema::{BackendConfig, PersistedConfig, ProxyConfig};

/// Error type for configuration persistence.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("cannot serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the configuration file.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    proxy: ProxyConfig,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>, proxy: ProxyConfig) -> Self {
        Self {
            path: path.into(),
            proxy,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replace the file with the given target list.
    ///
    /// Writes a sibling temporary file and renames it over the config file, so
    /// a crash mid-write leaves the previous file intact.
    pub async fn persist(&self, urls: Vec<String>) -> Result<(), PersistenceError> {
        let config = PersistedConfig {
            proxy: self.proxy.clone(),
            backends: urls.into_iter().map(BackendConfig::from).collect(),
        };
        let mut content = serde_json::to_vec_pretty(&config)?;
        content.push(b'\n');

        let temp = self.temp_path();
        tokio::fs::write(&temp, &content)
            .await
            .map_err(|source| PersistenceError::Io {
                path: temp.clone(),
                source,
            })?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(
            path = %self.path.display(),
            backends = config.backends.len(),
            "Configuration persisted"
        );
        Ok(())
    }
}
