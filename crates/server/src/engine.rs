//! Protocol engine: request validation, chunk application, completion.
//!
//! The engine owns the per-upload state machine. Raw header values flow in
//! unparsed so that missing, non-numeric, and negative inputs are rejected
//! here with specific reasons rather than at the HTTP layer. All
//! validation and not-found conditions are detected before any mutation;
//! partial chunk writes are never rolled back, because the offset actually
//! reached is the resumption point.

use crate::metrics::{BYTES_RECEIVED, CHUNK_APPLY_DURATION, CHUNKS_APPLIED, UPLOADS_COMPLETED, UPLOADS_CREATED};
use crate::notify::CompletionNotifier;
use berth_core::{
    CONTENT_LENGTH_HEADER, ENTITY_LENGTH_HEADER, OFFSET_HEADER, OFFSET_STREAM_CONTENT_TYPE,
    UploadId, UploadMeta, UploadRecord,
};
use berth_metadata::{MetadataError, RecordStore};
use berth_storage::{ContentStore, StorageError};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Errors surfaced by the protocol engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed, out-of-range, or out-of-order request. The message is
    /// the human-readable reason reported to the client.
    #[error("{0}")]
    Validation(String),

    /// Declared length above the configured maximum.
    #[error("File exceeds maximum allowed file size of {max} bytes")]
    QuotaExceeded { max: u64 },

    /// Unknown upload identifier.
    #[error("upload not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("record store error: {0}")]
    Metadata(#[from] MetadataError),
}

/// Raw inputs for upload creation.
///
/// Header values arrive unparsed; the engine owns the distinct
/// missing / non-numeric / negative failures.
#[derive(Clone, Debug, Default)]
pub struct CreateRequest {
    /// `Entity-Length` header value.
    pub entity_length: Option<String>,
    /// `Content-Type` header value, recorded as metadata.
    pub content_type: Option<String>,
    /// `Entity-Name` header value, recorded as metadata.
    pub entity_name: Option<String>,
}

/// Raw inputs for chunk application.
#[derive(Clone, Debug, Default)]
pub struct ChunkRequest {
    /// `Content-Type` header value; must be the offset stream marker.
    pub content_type: Option<String>,
    /// `Offset` header value: the chunk's claimed starting offset.
    pub offset: Option<String>,
    /// `Content-Length` header value: the chunk's claimed byte length.
    pub content_length: Option<String>,
}

/// Outcome of a successful creation.
#[derive(Clone, Debug)]
pub struct CreatedUpload {
    /// The freshly assigned identifier.
    pub id: UploadId,
    /// Resource path for subsequent chunk and status operations.
    pub location: String,
}

/// Outcome of a successful chunk application.
#[derive(Clone, Debug)]
pub struct ChunkOutcome {
    /// The record after the write attempt.
    pub record: UploadRecord,
    /// Whether this application performed the completion transition.
    pub completed: bool,
}

/// The protocol engine.
///
/// Validates requests against the per-upload state machine, streams chunk
/// bytes into the content store, and commits progress through the record
/// store's monotonic offset advance. Constructed once and shared; all
/// contention is scoped to a single upload identifier.
pub struct UploadEngine {
    records: Arc<dyn RecordStore>,
    content: Arc<dyn ContentStore>,
    notifier: Arc<dyn CompletionNotifier>,
    max_entity_length: Option<u64>,
    base_path: String,
}

impl UploadEngine {
    /// Create a new engine.
    pub fn new(
        records: Arc<dyn RecordStore>,
        content: Arc<dyn ContentStore>,
        notifier: Arc<dyn CompletionNotifier>,
        max_entity_length: Option<u64>,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            records,
            content,
            notifier,
            max_entity_length,
            base_path: base_path.into(),
        }
    }

    /// Create a new upload from a declared entity length.
    ///
    /// Allocates the zero-filled container and persists the record as an
    /// atomic pair: if the record write fails, the container is removed so
    /// the upload is never observable as existing.
    #[tracing::instrument(skip(self, req))]
    pub async fn create_upload(&self, req: CreateRequest) -> Result<CreatedUpload, EngineError> {
        let entity_length =
            parse_non_negative_header(ENTITY_LENGTH_HEADER, req.entity_length.as_deref())?;

        if let Some(max) = self.max_entity_length
            && entity_length > max
        {
            return Err(EngineError::QuotaExceeded { max });
        }

        let id = UploadId::generate();
        let mut meta = UploadMeta::new();
        meta.insert("contentType".to_string(), req.content_type);
        meta.insert("filename".to_string(), req.entity_name);
        let record = UploadRecord::new(id, entity_length, meta);

        self.content.create(&id, entity_length).await?;
        if let Err(e) = self.records.create(&record).await {
            if let Err(cleanup) = self.content.remove(&id).await {
                tracing::warn!(
                    upload_id = %id,
                    error = %cleanup,
                    "Failed to remove container after record create failure"
                );
            }
            return Err(e.into());
        }

        UPLOADS_CREATED.inc();
        tracing::info!(upload_id = %id, entity_length, "Created upload");

        // A zero-length upload has nothing left to receive: its offset
        // reaches the entity length the moment the record exists.
        if record.is_complete() {
            UPLOADS_COMPLETED.inc();
            self.notifier.upload_complete(&record).await;
        }

        Ok(CreatedUpload {
            id,
            location: format!("{}/{}", self.base_path, id),
        })
    }

    /// Report the committed offset for an upload. Read-only.
    pub async fn status(&self, id: &str) -> Result<u64, EngineError> {
        let Ok(id) = UploadId::parse(id) else {
            // An unparseable identifier names no resource.
            return Err(EngineError::NotFound);
        };
        match self.records.get(&id).await? {
            Some(record) => Ok(record.offset),
            None => Err(EngineError::NotFound),
        }
    }

    /// Apply one chunk to an upload.
    ///
    /// The body may end early or fail on the sender's side at any point;
    /// that is a normal short write, not an error. Whatever bytes reached
    /// the container are committed through the monotonic offset advance,
    /// and the response reports the offset actually reached. Only a
    /// storage failure that flushed nothing surfaces as an error.
    pub async fn apply_chunk<S, E>(
        &self,
        id: &str,
        req: ChunkRequest,
        mut body: S,
    ) -> Result<ChunkOutcome, EngineError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
        E: fmt::Display,
    {
        let start = Instant::now();

        let Ok(id) = UploadId::parse(id) else {
            return Err(EngineError::NotFound);
        };
        let record = self.records.get(&id).await?.ok_or(EngineError::NotFound)?;

        if req.content_type.as_deref() != Some(OFFSET_STREAM_CONTENT_TYPE) {
            return Err(EngineError::Validation("Invalid Content-Type".to_string()));
        }

        let claimed_offset = parse_non_negative_header(OFFSET_HEADER, req.offset.as_deref())?;
        if claimed_offset > record.offset {
            // Re-sending from a committed point is fine; skipping ahead of
            // unwritten regions is not.
            return Err(EngineError::Validation(format!(
                "Offset: {claimed_offset} exceeds current offset: {}",
                record.offset
            )));
        }

        let claimed_length =
            parse_non_negative_header(CONTENT_LENGTH_HEADER, req.content_length.as_deref())?;
        if claimed_length > record.entity_length {
            return Err(EngineError::Validation(
                "Content-Length exceeds file Entity-Length".to_string(),
            ));
        }
        if claimed_offset + claimed_length > record.entity_length {
            return Err(EngineError::Validation(
                "Offset + Content-Length exceeds file Entity-Length".to_string(),
            ));
        }

        // Completeness is terminal: a re-send against a complete upload is
        // accepted as a no-op reporting the final offset.
        if record.is_complete() {
            tracing::debug!(upload_id = %id, "Chunk against complete upload ignored");
            return Ok(ChunkOutcome {
                record,
                completed: false,
            });
        }

        let (written, storage_err) = self
            .drain_into_container(&id, claimed_offset, claimed_length, &mut body)
            .await?;

        if written == 0 {
            if let Some(err) = storage_err {
                return Err(err.into());
            }
            // Nothing arrived and nothing failed; the committed offset is
            // already the correct resumption point.
            return Ok(ChunkOutcome {
                record,
                completed: false,
            });
        }

        let candidate = claimed_offset + written;
        let advance = self.records.advance_offset(&id, candidate).await?;

        CHUNKS_APPLIED.inc();
        BYTES_RECEIVED.inc_by(written);
        CHUNK_APPLY_DURATION.observe(start.elapsed().as_secs_f64());

        if let Some(err) = storage_err {
            // Bytes flushed before the failure stay credited; the client
            // resumes from the recorded offset.
            tracing::warn!(
                upload_id = %id,
                written,
                offset = advance.record.offset,
                error = %err,
                "Chunk write failed after partial flush"
            );
        }

        if advance.completed {
            UPLOADS_COMPLETED.inc();
            tracing::info!(
                upload_id = %id,
                entity_length = advance.record.entity_length,
                "Upload complete"
            );
            self.notifier.upload_complete(&advance.record).await;
        } else {
            tracing::debug!(
                upload_id = %id,
                offset = advance.record.offset,
                written,
                "Chunk applied"
            );
        }

        Ok(ChunkOutcome {
            record: advance.record,
            completed: advance.completed,
        })
    }

    /// Stream body frames into the container at the claimed offset.
    ///
    /// Returns the bytes actually written plus the storage error that
    /// ended the write, if any. A body stream error is sender-initiated
    /// termination: whatever was flushed stands. The writer is closed on
    /// every exit path so a later resume is never blocked.
    async fn drain_into_container<S, E>(
        &self,
        id: &UploadId,
        offset: u64,
        limit: u64,
        body: &mut S,
    ) -> Result<(u64, Option<StorageError>), EngineError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
        E: fmt::Display,
    {
        let mut writer = self.content.write_at(id, offset).await?;
        let mut written: u64 = 0;
        let mut remaining = limit;
        let mut storage_err = None;

        while remaining > 0 {
            let frame = match body.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    tracing::debug!(upload_id = %id, error = %e, "Sender closed chunk stream early");
                    break;
                }
                None => break,
            };
            if frame.is_empty() {
                continue;
            }

            // The claimed Content-Length bounds the write, so the
            // committed offset can never pass the entity length.
            let take = frame.len().min(remaining as usize);
            match writer.write(frame.slice(..take)).await {
                Ok(()) => {
                    written += take as u64;
                    remaining -= take as u64;
                }
                Err(e) => {
                    storage_err = Some(e);
                    break;
                }
            }
        }

        match storage_err {
            Some(_) => {
                if let Err(e) = writer.abort().await {
                    tracing::warn!(upload_id = %id, error = %e, "Failed to abort chunk writer");
                }
            }
            None => {
                if let Err(e) = writer.finish().await {
                    storage_err = Some(e);
                }
            }
        }

        Ok((written, storage_err))
    }
}

/// Parse a required non-negative integer header, with the protocol's
/// distinct missing / non-numeric / negative failures.
fn parse_non_negative_header(key: &str, value: Option<&str>) -> Result<u64, EngineError> {
    let value = value
        .ok_or_else(|| EngineError::Validation(format!("{key} header must not be empty")))?;
    let parsed: i64 = value
        .trim()
        .parse()
        .map_err(|_| EngineError::Validation(format!("Invalid {key} header")))?;
    if parsed < 0 {
        return Err(EngineError::Validation(format!("{key} header must be > 0")));
    }
    Ok(parsed as u64)
}
