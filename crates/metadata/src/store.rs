//! Record store trait and filesystem implementation.

use crate::error::{MetadataError, MetadataResult};
use async_trait::async_trait;
use berth_core::{UploadId, UploadRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

/// Result of a monotonic offset advance.
#[derive(Clone, Debug)]
pub struct OffsetAdvance {
    /// The record after the update.
    pub record: UploadRecord,
    /// Whether the candidate was applied.
    pub advanced: bool,
    /// Whether this call moved the record into the complete state.
    pub completed: bool,
}

/// Upload record persistence.
///
/// Records survive process restarts; a store opened over existing state
/// sees every previously persisted record.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Persist a brand-new record. Fails with `AlreadyExists` if the
    /// identifier is taken.
    async fn create(&self, record: &UploadRecord) -> MetadataResult<()>;

    /// Fetch a record by identifier.
    async fn get(&self, id: &UploadId) -> MetadataResult<Option<UploadRecord>>;

    /// Advance the committed offset to `candidate` if and only if it is
    /// strictly greater than the current offset.
    ///
    /// The read-compare-write is serialized per identifier, so a stale
    /// candidate from a slower concurrent writer can never regress an
    /// offset a faster writer already advanced. Candidates beyond the
    /// entity length are rejected with a constraint error.
    async fn advance_offset(&self, id: &UploadId, candidate: u64) -> MetadataResult<OffsetAdvance>;

    /// Remove a record.
    async fn remove(&self, id: &UploadId) -> MetadataResult<()>;

    /// Check store availability.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// Filesystem-backed record store.
///
/// One `{id}.info` JSON file per upload under the root. Record writes go
/// through a temp file plus rename, so a crash mid-write never leaves a
/// torn record behind.
pub struct FilesystemRecordStore {
    root: PathBuf,
    locks: Mutex<HashMap<UploadId, Arc<Mutex<()>>>>,
}

impl FilesystemRecordStore {
    /// Create a new store, creating the root directory if missing.
    pub async fn new(root: impl AsRef<Path>) -> MetadataResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, id: &UploadId) -> PathBuf {
        self.root.join(format!("{id}.info"))
    }

    /// Get the serialization lock for one identifier.
    async fn lock_for(&self, id: &UploadId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(*id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_record(&self, id: &UploadId) -> MetadataResult<Option<UploadRecord>> {
        match fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_record(&self, record: &UploadRecord) -> MetadataResult<()> {
        let path = self.record_path(&record.id);
        let tmp = path.with_extension("info.tmp");
        let json = serde_json::to_vec(record)?;
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FilesystemRecordStore {
    async fn create(&self, record: &UploadRecord) -> MetadataResult<()> {
        let lock = self.lock_for(&record.id).await;
        let _guard = lock.lock().await;

        if fs::try_exists(self.record_path(&record.id)).await? {
            return Err(MetadataError::AlreadyExists(record.id.to_string()));
        }
        self.write_record(record).await
    }

    async fn get(&self, id: &UploadId) -> MetadataResult<Option<UploadRecord>> {
        self.read_record(id).await
    }

    async fn advance_offset(&self, id: &UploadId, candidate: u64) -> MetadataResult<OffsetAdvance> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut record = self
            .read_record(id)
            .await?
            .ok_or_else(|| MetadataError::NotFound(id.to_string()))?;

        if candidate > record.entity_length {
            return Err(MetadataError::Constraint(format!(
                "offset {candidate} exceeds entity length {} for upload {id}",
                record.entity_length
            )));
        }

        let advanced = candidate > record.offset;
        if advanced {
            record.offset = candidate;
            self.write_record(&record).await?;
        }

        // A complete record can never be advanced (the candidate would
        // exceed the entity length), so an advance that lands on the
        // entity length is the incomplete-to-complete transition.
        let completed = advanced && record.is_complete();

        Ok(OffsetAdvance {
            record,
            advanced,
            completed,
        })
    }

    async fn remove(&self, id: &UploadId) -> MetadataResult<()> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MetadataError::NotFound(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> MetadataResult<()> {
        let meta = fs::metadata(&self.root).await?;
        if !meta.is_dir() {
            return Err(MetadataError::Config(format!(
                "record root is not a directory: {}",
                self.root.display()
            )));
        }
        Ok(())
    }
}
