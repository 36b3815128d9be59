//! Application state shared across handlers.

use crate::engine::UploadEngine;
use crate::notify::CompletionNotifier;
use berth_core::config::AppConfig;
use berth_metadata::RecordStore;
use berth_storage::ContentStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Upload record store.
    pub records: Arc<dyn RecordStore>,
    /// Content container store.
    pub content: Arc<dyn ContentStore>,
    /// The protocol engine.
    pub engine: Arc<UploadEngine>,
}

impl AppState {
    /// Create new application state.
    ///
    /// # Panics
    ///
    /// Panics if the server configuration is invalid.
    pub fn new(
        config: AppConfig,
        records: Arc<dyn RecordStore>,
        content: Arc<dyn ContentStore>,
        notifier: Arc<dyn CompletionNotifier>,
    ) -> Self {
        if let Err(error) = config.server.validate() {
            panic!("Invalid server configuration: {error}");
        }

        let engine = Arc::new(UploadEngine::new(
            records.clone(),
            content.clone(),
            notifier,
            config.server.max_entity_length,
            config.server.base_path.clone(),
        ));

        Self {
            config: Arc::new(config),
            records,
            content,
            engine,
        }
    }
}
