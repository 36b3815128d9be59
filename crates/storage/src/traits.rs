//! Content store trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use berth_core::UploadId;
use bytes::Bytes;

/// Content store abstraction for upload containers.
///
/// A container is a pre-sized byte region addressed by upload identifier.
/// It is allocated zero-filled at its final length when the upload is
/// created, so chunk writes can be positioned at any admitted offset
/// without extension logic at write time. Writers address the container by
/// absolute offset, so two concurrent writers never corrupt each other's
/// bytes.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Allocate an empty container of exactly `length` zero bytes.
    async fn create(&self, id: &UploadId, length: u64) -> StorageResult<()>;

    /// Check if a container exists.
    async fn exists(&self, id: &UploadId) -> StorageResult<bool>;

    /// Open a writer positioned at an absolute byte offset.
    async fn write_at(&self, id: &UploadId, offset: u64) -> StorageResult<Box<dyn ChunkWriter>>;

    /// Read the full container contents.
    async fn read(&self, id: &UploadId) -> StorageResult<Bytes>;

    /// Remove a container.
    async fn remove(&self, id: &UploadId) -> StorageResult<()>;

    /// Get the name of this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend availability.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Positioned writer into a single container.
///
/// The writer holds the container only while it is alive; dropping an
/// unfinished writer releases the container just as `abort` does, so a
/// failed transfer never blocks a later resume.
#[async_trait]
pub trait ChunkWriter: Send {
    /// Write the next run of bytes at the current position.
    async fn write(&mut self, data: Bytes) -> StorageResult<()>;

    /// Flush and close, returning the total bytes written by this writer.
    async fn finish(self: Box<Self>) -> StorageResult<u64>;

    /// Discard the writer without flushing.
    async fn abort(self: Box<Self>) -> StorageResult<()>;
}
