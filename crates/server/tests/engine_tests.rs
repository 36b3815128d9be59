//! Engine-level tests exercising chunk application against real stores.

mod common;

use berth_core::UploadId;
use berth_metadata::{FilesystemRecordStore, RecordStore};
use berth_server::{ChunkRequest, CreateRequest, EngineError, UploadEngine};
use berth_storage::{ContentStore, FilesystemBackend};
use bytes::Bytes;
use common::notify::RecordingNotifier;
use common::storage::FailingContentStore;
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tempfile::TempDir;

struct TestEngine {
    engine: Arc<UploadEngine>,
    records: Arc<dyn RecordStore>,
    content: Arc<dyn ContentStore>,
    notifier: Arc<RecordingNotifier>,
    _temp_dir: TempDir,
}

async fn build_engine() -> TestEngine {
    let temp_dir = tempfile::tempdir().unwrap();

    let content: Arc<dyn ContentStore> = Arc::new(
        FilesystemBackend::new(temp_dir.path().join("containers"))
            .await
            .unwrap(),
    );
    let records: Arc<dyn RecordStore> = Arc::new(
        FilesystemRecordStore::new(temp_dir.path().join("records"))
            .await
            .unwrap(),
    );
    let notifier = RecordingNotifier::new();

    let engine = Arc::new(UploadEngine::new(
        records.clone(),
        content.clone(),
        notifier.clone(),
        None,
        "/files",
    ));

    TestEngine {
        engine,
        records,
        content,
        notifier,
        _temp_dir: temp_dir,
    }
}

fn create_request(entity_length: &str) -> CreateRequest {
    CreateRequest {
        entity_length: Some(entity_length.to_string()),
        content_type: None,
        entity_name: None,
    }
}

fn chunk_request(offset: &str, length: &str) -> ChunkRequest {
    ChunkRequest {
        content_type: Some("application/offset+octet-stream".to_string()),
        offset: Some(offset.to_string()),
        content_length: Some(length.to_string()),
    }
}

fn body(data: &'static [u8]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin + Send {
    futures::stream::iter(vec![Ok(Bytes::from_static(data))])
}

#[tokio::test]
async fn creation_allocates_record_and_container_pair() {
    let t = build_engine().await;

    let created = t.engine.create_upload(create_request("10")).await.unwrap();
    assert_eq!(created.location, format!("/files/{}", created.id));

    let record = t.records.get(&created.id).await.unwrap().unwrap();
    assert_eq!(record.entity_length, 10);
    assert_eq!(record.offset, 0);

    let data = t.content.read(&created.id).await.unwrap();
    assert_eq!(data.len(), 10);
    assert!(data.iter().all(|&b| b == 0));
}

/// Record store that refuses every create, for exercising the atomic-pair
/// rollback.
struct RejectingRecordStore;

#[async_trait::async_trait]
impl RecordStore for RejectingRecordStore {
    async fn create(&self, record: &berth_core::UploadRecord) -> berth_metadata::MetadataResult<()> {
        Err(berth_metadata::MetadataError::Constraint(format!(
            "record store rejects {}",
            record.id
        )))
    }

    async fn get(
        &self,
        _id: &UploadId,
    ) -> berth_metadata::MetadataResult<Option<berth_core::UploadRecord>> {
        Ok(None)
    }

    async fn advance_offset(
        &self,
        id: &UploadId,
        _candidate: u64,
    ) -> berth_metadata::MetadataResult<berth_metadata::OffsetAdvance> {
        Err(berth_metadata::MetadataError::NotFound(id.to_string()))
    }

    async fn remove(&self, id: &UploadId) -> berth_metadata::MetadataResult<()> {
        Err(berth_metadata::MetadataError::NotFound(id.to_string()))
    }

    async fn health_check(&self) -> berth_metadata::MetadataResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn failed_record_persistence_rolls_back_the_container() {
    let temp_dir = tempfile::tempdir().unwrap();
    let containers = temp_dir.path().join("containers");
    let content: Arc<dyn ContentStore> =
        Arc::new(FilesystemBackend::new(&containers).await.unwrap());
    let notifier = RecordingNotifier::new();
    let engine = UploadEngine::new(
        Arc::new(RejectingRecordStore),
        content,
        notifier.clone(),
        None,
        "/files",
    );

    let err = engine.create_upload(create_request("8")).await.unwrap_err();
    match err {
        EngineError::Metadata(berth_metadata::MetadataError::Constraint(_)) => {}
        other => panic!("unexpected error: {other:?}"),
    }

    // The container allocated for the doomed record was removed with it
    let leftover = std::fs::read_dir(&containers).unwrap().count();
    assert_eq!(leftover, 0);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn resume_from_midpoint_overwrites_tail() {
    let t = build_engine().await;
    let created = t.engine.create_upload(create_request("10")).await.unwrap();

    // A prior transfer left 7 bytes committed
    let mut writer = t.content.write_at(&created.id, 0).await.unwrap();
    writer.write(Bytes::from_static(b"abcdefg")).await.unwrap();
    writer.finish().await.unwrap();
    t.records.advance_offset(&created.id, 7).await.unwrap();

    // The resume re-sends from offset 3 with the final 7 bytes
    let outcome = t
        .engine
        .apply_chunk(&created.id.to_string(), chunk_request("3", "7"), body(b"content"))
        .await
        .unwrap();

    assert_eq!(outcome.record.offset, 10);
    assert!(outcome.completed);
    assert_eq!(t.notifier.count(), 1);

    let data = t.content.read(&created.id).await.unwrap();
    assert_eq!(data.as_ref(), b"abccontent");
}

#[tokio::test]
async fn validation_failures_leave_no_trace() {
    let t = build_engine().await;
    let created = t.engine.create_upload(create_request("10")).await.unwrap();
    let id = created.id.to_string();

    let err = t
        .engine
        .apply_chunk(&id, chunk_request("5", "4"), body(b"data"))
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(msg) => {
            assert_eq!(msg, "Offset: 5 exceeds current offset: 0");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = t
        .engine
        .apply_chunk(&id, chunk_request("0", "-1"), body(b"data"))
        .await
        .unwrap_err();
    match err {
        EngineError::Validation(msg) => {
            assert_eq!(msg, "Content-Length header must be > 0");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // No bytes written, no offset movement
    let data = t.content.read(&created.id).await.unwrap();
    assert!(data.iter().all(|&b| b == 0));
    assert_eq!(t.engine.status(&id).await.unwrap(), 0);
}

#[tokio::test]
async fn declared_length_bounds_the_write() {
    let t = build_engine().await;
    let created = t.engine.create_upload(create_request("10")).await.unwrap();

    // The sender claims 4 bytes but transmits 6; the overflow is dropped
    let outcome = t
        .engine
        .apply_chunk(
            &created.id.to_string(),
            chunk_request("0", "4"),
            body(b"abcdef"),
        )
        .await
        .unwrap();

    assert_eq!(outcome.record.offset, 4);
    let data = t.content.read(&created.id).await.unwrap();
    assert_eq!(&data[..4], b"abcd");
    assert!(data[4..].iter().all(|&b| b == 0));
}

#[tokio::test]
async fn interrupted_stream_credits_flushed_bytes() {
    let t = build_engine().await;
    let created = t.engine.create_upload(create_request("7")).await.unwrap();

    let interrupted = futures::stream::iter(vec![
        Ok(Bytes::from_static(b"cont")),
        Err(std::io::Error::other("connection reset")),
    ]);

    let outcome = t
        .engine
        .apply_chunk(&created.id.to_string(), chunk_request("0", "7"), interrupted)
        .await
        .unwrap();

    assert_eq!(outcome.record.offset, 4);
    assert!(!outcome.completed);
    assert_eq!(t.notifier.count(), 0);
    assert_eq!(t.engine.status(&created.id.to_string()).await.unwrap(), 4);
}

#[tokio::test]
async fn empty_stream_is_a_noop() {
    let t = build_engine().await;
    let created = t.engine.create_upload(create_request("7")).await.unwrap();

    let empty = futures::stream::iter(Vec::<Result<Bytes, Infallible>>::new());
    let outcome = t
        .engine
        .apply_chunk(&created.id.to_string(), chunk_request("0", "7"), empty)
        .await
        .unwrap();

    assert_eq!(outcome.record.offset, 0);
    assert!(!outcome.completed);
}

#[tokio::test]
async fn hard_failure_with_nothing_flushed_is_an_error() {
    let temp_dir = tempfile::tempdir().unwrap();
    let records: Arc<dyn RecordStore> = Arc::new(
        FilesystemRecordStore::new(temp_dir.path().join("records"))
            .await
            .unwrap(),
    );
    let notifier = RecordingNotifier::new();
    let engine = UploadEngine::new(
        records.clone(),
        Arc::new(FailingContentStore),
        notifier.clone(),
        None,
        "/files",
    );

    let created = engine.create_upload(create_request("7")).await.unwrap();
    let err = engine
        .apply_chunk(&created.id.to_string(), chunk_request("0", "7"), body(b"content"))
        .await
        .unwrap_err();

    match err {
        EngineError::Storage(_) => {}
        other => panic!("unexpected error: {other:?}"),
    }

    // The committed offset is untouched and resumable
    assert_eq!(engine.status(&created.id.to_string()).await.unwrap(), 0);
    assert_eq!(notifier.count(), 0);
}

#[tokio::test]
async fn concurrent_applications_settle_on_the_larger_offset() {
    let t = build_engine().await;
    let created = t.engine.create_upload(create_request("10")).await.unwrap();
    let id = created.id.to_string();

    // Both requests were admitted against offset 0; whichever order their
    // writes land in, the committed offset is the larger candidate.
    let six = {
        let engine = t.engine.clone();
        let id = id.clone();
        tokio::spawn(async move {
            engine
                .apply_chunk(&id, chunk_request("0", "6"), body(b"abcdef"))
                .await
                .unwrap()
        })
    };
    let four = {
        let engine = t.engine.clone();
        let id = id.clone();
        tokio::spawn(async move {
            engine
                .apply_chunk(&id, chunk_request("0", "4"), body(b"wxyz"))
                .await
                .unwrap()
        })
    };

    six.await.unwrap();
    four.await.unwrap();

    assert_eq!(t.engine.status(&id).await.unwrap(), 6);
    assert_eq!(t.notifier.count(), 0);
}

#[tokio::test]
async fn completion_fires_exactly_once_for_zero_length() {
    let t = build_engine().await;

    let created = t.engine.create_upload(create_request("0")).await.unwrap();
    assert_eq!(t.notifier.count(), 1);
    assert_eq!(t.engine.status(&created.id.to_string()).await.unwrap(), 0);

    // A zero-length chunk against the complete upload stays a no-op
    let outcome = t
        .engine
        .apply_chunk(
            &created.id.to_string(),
            chunk_request("0", "0"),
            futures::stream::iter(Vec::<Result<Bytes, Infallible>>::new()),
        )
        .await
        .unwrap();
    assert!(!outcome.completed);
    assert_eq!(t.notifier.count(), 1);
}

#[tokio::test]
async fn status_of_unknown_upload_is_not_found() {
    let t = build_engine().await;

    match t.engine.status(&UploadId::generate().to_string()).await {
        Err(EngineError::NotFound) => {}
        other => panic!("unexpected result: {other:?}"),
    }

    match t.engine.status("not-a-valid-id").await {
        Err(EngineError::NotFound) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}
