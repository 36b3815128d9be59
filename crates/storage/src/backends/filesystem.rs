//! Local filesystem content store backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ChunkWriter, ContentStore};
use async_trait::async_trait;
use berth_core::UploadId;
use bytes::Bytes;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::instrument;

/// Local filesystem content store.
///
/// Each upload owns one `{id}.bin` file under the root, pre-sized to the
/// declared entity length via `set_len` (sparse where the filesystem
/// supports it), so positioned writes never extend the file.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend, creating the root if missing.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Container file path for an upload.
    ///
    /// Identifiers are rendered through `UploadId`, never raw client
    /// strings, so the joined path cannot escape the root.
    fn container_path(&self, id: &UploadId) -> PathBuf {
        self.root.join(format!("{id}.bin"))
    }
}

#[async_trait]
impl ContentStore for FilesystemBackend {
    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn create(&self, id: &UploadId, length: u64) -> StorageResult<()> {
        let path = self.container_path(id);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists(id.to_string())
                } else {
                    StorageError::Io(e)
                }
            })?;
        file.set_len(length).await?;
        file.sync_all().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, id: &UploadId) -> StorageResult<bool> {
        let path = self.container_path(id);
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn write_at(&self, id: &UploadId, offset: u64) -> StorageResult<Box<dyn ChunkWriter>> {
        let path = self.container_path(id);
        let mut file = OpenOptions::new()
            .write(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    StorageError::NotFound(id.to_string())
                } else {
                    StorageError::Io(e)
                }
            })?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(Box::new(FsChunkWriter { file, written: 0 }))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn read(&self, id: &UploadId) -> StorageResult<Bytes> {
        let path = self.container_path(id);
        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(id.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;
        Ok(Bytes::from(data))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn remove(&self, id: &UploadId) -> StorageResult<()> {
        let path = self.container_path(id);
        fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(id.to_string())
            } else {
                StorageError::Io(e)
            }
        })
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(StorageError::Config(format!(
                "storage root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}

/// Positioned writer over a container file.
struct FsChunkWriter {
    file: File,
    written: u64,
}

#[async_trait]
impl ChunkWriter for FsChunkWriter {
    async fn write(&mut self, data: Bytes) -> StorageResult<()> {
        self.file.write_all(&data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> StorageResult<u64> {
        self.file.flush().await?;
        Ok(self.written)
    }

    async fn abort(self: Box<Self>) -> StorageResult<()> {
        // Dropping the handle releases the container.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_allocates_zero_filled_container() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = UploadId::generate();

        backend.create(&id, 8).await.unwrap();
        assert!(backend.exists(&id).await.unwrap());

        let data = backend.read(&id).await.unwrap();
        assert_eq!(data.as_ref(), &[0u8; 8]);
    }

    #[tokio::test]
    async fn create_rejects_duplicate() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = UploadId::generate();

        backend.create(&id, 4).await.unwrap();
        match backend.create(&id, 4).await {
            Err(StorageError::AlreadyExists(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn write_at_missing_container_is_not_found() {
        let temp = tempdir().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        match backend.write_at(&UploadId::generate(), 0).await {
            Err(StorageError::NotFound(_)) => {}
            Ok(_) => panic!("expected NotFound"),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
