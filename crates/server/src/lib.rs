//! HTTP API server for the berth resumable upload protocol.
//!
//! This crate provides:
//! - The protocol engine: validation, chunk application, completion
//! - Completion notification at the incomplete-to-complete transition
//! - HTTP adapters for creation, chunk application, and status query
//! - Prometheus metrics

pub mod engine;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod notify;
pub mod routes;
pub mod state;

pub use engine::{
    ChunkOutcome, ChunkRequest, CreateRequest, CreatedUpload, EngineError, UploadEngine,
};
pub use error::ApiError;
pub use notify::{CompletionNotifier, LogNotifier};
pub use routes::create_router;
pub use state::AppState;
