//! Content container storage for berth.
//!
//! This crate provides:
//! - Pre-sized upload containers with absolute-offset positioned writes
//! - Backend: local filesystem

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{ChunkWriter, ContentStore};

use berth_core::config::StorageConfig;
use std::sync::Arc;

/// Create a content store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn ContentStore>> {
    config
        .validate()
        .map_err(|e| StorageError::Config(e.to_string()))?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
