//! Server test fixture.

use super::notify::RecordingNotifier;
use berth_core::config::AppConfig;
use berth_metadata::{FilesystemRecordStore, RecordStore};
use berth_server::{AppState, create_router};
use berth_storage::{ContentStore, FilesystemBackend};
use std::sync::Arc;
use tempfile::TempDir;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary stores.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let mut config = AppConfig::for_testing(temp_dir.path());
        modifier(&mut config);

        let berth_core::config::StorageConfig::Filesystem { path } = &config.storage;
        let content: Arc<dyn ContentStore> = Arc::new(
            FilesystemBackend::new(path)
                .await
                .expect("Failed to create content store"),
        );

        let berth_core::config::MetadataConfig::Filesystem { path } = &config.metadata;
        let records: Arc<dyn RecordStore> = Arc::new(
            FilesystemRecordStore::new(path)
                .await
                .expect("Failed to create record store"),
        );

        let notifier = RecordingNotifier::new();
        let state = AppState::new(config, records, content, notifier.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            notifier,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying record store.
    pub fn records(&self) -> Arc<dyn RecordStore> {
        self.state.records.clone()
    }

    /// Get access to the underlying content store.
    pub fn content(&self) -> Arc<dyn ContentStore> {
        self.state.content.clone()
    }
}
