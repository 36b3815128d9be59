//! Content store mocks.

use async_trait::async_trait;
use berth_core::UploadId;
use berth_storage::{ChunkWriter, ContentStore, StorageError, StorageResult};
use bytes::Bytes;

/// Content store whose writers fail on the first write with nothing
/// flushed, for exercising the hard-I/O-failure path.
#[allow(dead_code)]
pub struct FailingContentStore;

#[async_trait]
impl ContentStore for FailingContentStore {
    async fn create(&self, _id: &UploadId, _length: u64) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, _id: &UploadId) -> StorageResult<bool> {
        Ok(true)
    }

    async fn write_at(&self, _id: &UploadId, _offset: u64) -> StorageResult<Box<dyn ChunkWriter>> {
        Ok(Box::new(FailingWriter))
    }

    async fn read(&self, id: &UploadId) -> StorageResult<Bytes> {
        Err(StorageError::NotFound(id.to_string()))
    }

    async fn remove(&self, _id: &UploadId) -> StorageResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

struct FailingWriter;

#[async_trait]
impl ChunkWriter for FailingWriter {
    async fn write(&mut self, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Io(std::io::Error::other(
            "simulated disk failure",
        )))
    }

    async fn finish(self: Box<Self>) -> StorageResult<u64> {
        Ok(0)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
