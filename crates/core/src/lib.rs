//! Core domain types and shared logic for the berth upload server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload identifiers and the upload record lifecycle
//! - Opaque upload metadata captured at creation
//! - Configuration types
//! - Protocol header names and the chunk content type

pub mod config;
pub mod error;
pub mod upload;

pub use config::{AppConfig, MetadataConfig, ServerConfig, StorageConfig};
pub use error::{Error, Result};
pub use upload::{UploadId, UploadMeta, UploadRecord, UploadState};

/// Content type required on chunk application requests.
pub const OFFSET_STREAM_CONTENT_TYPE: &str = "application/offset+octet-stream";

/// Header carrying the declared total upload size at creation.
pub const ENTITY_LENGTH_HEADER: &str = "Entity-Length";

/// Header carrying the declared original name at creation.
pub const ENTITY_NAME_HEADER: &str = "Entity-Name";

/// Header carrying a chunk's starting byte offset.
pub const OFFSET_HEADER: &str = "Offset";

/// Header carrying a chunk's declared byte length.
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length";
