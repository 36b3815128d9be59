//! Recording completion notifier for tests.

use async_trait::async_trait;
use berth_core::UploadRecord;
use berth_server::CompletionNotifier;
use std::sync::{Arc, Mutex};

/// Notifier that records every completion it sees.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    completions: Mutex<Vec<UploadRecord>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// All completions observed so far.
    pub fn completions(&self) -> Vec<UploadRecord> {
        self.completions.lock().unwrap().clone()
    }

    /// Number of completions observed so far.
    pub fn count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionNotifier for RecordingNotifier {
    async fn upload_complete(&self, record: &UploadRecord) {
        self.completions.lock().unwrap().push(record.clone());
    }
}
