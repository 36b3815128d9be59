//! HTTP request handlers.

mod health;
mod uploads;

pub use health::health_check;
pub use uploads::{
    apply_chunk, collection_method_not_allowed, create_upload, resource_method_not_allowed,
    upload_status,
};
