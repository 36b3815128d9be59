//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Base resource path uploads are served under.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Maximum accepted entity length in bytes. Unset means unlimited.
    #[serde(default)]
    pub max_entity_length: Option<u64>,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_base_path() -> String {
    "/files".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            base_path: default_base_path(),
            max_entity_length: None,
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate the server configuration.
    ///
    /// The base path must be an absolute, non-root path without a trailing
    /// slash so that `{base_path}/{id}` locators compose cleanly.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.base_path.starts_with('/') {
            return Err(crate::Error::Config(format!(
                "base_path must start with '/': {}",
                self.base_path
            )));
        }
        if self.base_path.len() < 2 || self.base_path.ends_with('/') {
            return Err(crate::Error::Config(format!(
                "base_path must name a non-root path without a trailing slash: {}",
                self.base_path
            )));
        }
        Ok(())
    }
}

/// Content store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for upload containers.
        path: PathBuf,
    },
}

impl StorageConfig {
    /// Validate the storage configuration.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err(crate::Error::Config(
                        "storage path must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Record store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// Local filesystem storage, one JSON record per upload.
    Filesystem {
        /// Root directory for upload records.
        path: PathBuf,
    },
}

impl MetadataConfig {
    /// Validate the metadata configuration.
    pub fn validate(&self) -> crate::Result<()> {
        match self {
            Self::Filesystem { path } => {
                if path.as_os_str().is_empty() {
                    return Err(crate::Error::Config(
                        "metadata path must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Content store configuration.
    pub storage: StorageConfig,
    /// Record store configuration.
    pub metadata: MetadataConfig,
}

impl AppConfig {
    /// Create a test configuration rooted under the given directory.
    ///
    /// **For testing only.**
    pub fn for_testing(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Filesystem {
                path: root.join("containers"),
            },
            metadata: MetadataConfig::Filesystem {
                path: root.join("records"),
            },
        }
    }
}
