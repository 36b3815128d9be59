//! Upload record persistence for berth.
//!
//! This crate provides the control-plane data model:
//! - The `RecordStore` trait with monotonic, per-identifier-serialized
//!   offset advancement
//! - A filesystem backend storing one JSON record per upload

pub mod error;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{FilesystemRecordStore, OffsetAdvance, RecordStore};

use berth_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a record store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn RecordStore>> {
    config
        .validate()
        .map_err(|e| MetadataError::Config(e.to_string()))?;

    match config {
        MetadataConfig::Filesystem { path } => {
            let store = FilesystemRecordStore::new(path).await?;
            Ok(Arc::new(store) as Arc<dyn RecordStore>)
        }
    }
}
