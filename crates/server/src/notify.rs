//! Completion notification.

use async_trait::async_trait;
use berth_core::UploadRecord;

/// Callback invoked when an upload's committed offset reaches its entity
/// length.
///
/// Injected into the engine at construction and awaited at most once per
/// upload, by the chunk application (or, for zero-length uploads, the
/// creation) that performs the transition into the complete state.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    async fn upload_complete(&self, record: &UploadRecord);
}

/// Default notifier that records completions to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl CompletionNotifier for LogNotifier {
    async fn upload_complete(&self, record: &UploadRecord) {
        tracing::info!(
            upload_id = %record.id,
            entity_length = record.entity_length,
            "Upload complete"
        );
    }
}
