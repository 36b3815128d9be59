//! Upload protocol handlers.
//!
//! Thin adapters between axum and the protocol engine: they lift raw
//! header values and the body stream out of the request and hand them to
//! the engine, which owns all validation and state transitions.

use crate::engine::{ChunkRequest, CreateRequest};
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::header::{ALLOW, AsHeaderName, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use berth_core::{ENTITY_LENGTH_HEADER, ENTITY_NAME_HEADER, OFFSET_HEADER};
use serde::Serialize;

/// Response body for a chunk application.
#[derive(Debug, Serialize)]
pub struct ChunkResponse {
    /// Committed offset after the write attempt.
    pub offset: u64,
    /// Whether the upload is now complete.
    pub complete: bool,
}

fn header_string<K: AsHeaderName>(headers: &HeaderMap, key: K) -> Option<String> {
    headers
        .get(key)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// POST {base} - Create a new upload.
#[tracing::instrument(skip(state, headers))]
pub async fn create_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let create = CreateRequest {
        entity_length: header_string(&headers, ENTITY_LENGTH_HEADER),
        content_type: header_string(&headers, CONTENT_TYPE),
        entity_name: header_string(&headers, ENTITY_NAME_HEADER),
    };
    let host = header_string(&headers, HOST);

    let created = state.engine.create_upload(create).await?;

    // Compose an absolute locator when the client said who it was talking
    // to; fall back to the resource path otherwise.
    let location = match host {
        Some(host) => format!("http://{host}{}", created.location),
        None => created.location,
    };

    Ok((StatusCode::CREATED, [(LOCATION, location)]).into_response())
}

/// PATCH {base}/{id} - Apply a chunk at its claimed offset.
#[tracing::instrument(skip(state, req), fields(upload_id = %id))]
pub async fn apply_chunk(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> ApiResult<Json<ChunkResponse>> {
    let chunk = ChunkRequest {
        content_type: header_string(req.headers(), CONTENT_TYPE),
        offset: header_string(req.headers(), OFFSET_HEADER),
        content_length: header_string(req.headers(), CONTENT_LENGTH),
    };
    let body = req.into_body().into_data_stream();

    let outcome = state.engine.apply_chunk(&id, chunk, body).await?;

    Ok(Json(ChunkResponse {
        offset: outcome.record.offset,
        complete: outcome.record.is_complete(),
    }))
}

/// HEAD {base}/{id} - Report the committed offset.
#[tracing::instrument(skip(state), fields(upload_id = %id))]
pub async fn upload_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let offset = state.engine.status(&id).await?;
    Ok((StatusCode::OK, [(OFFSET_HEADER, offset.to_string())]).into_response())
}

/// Fallback for unsupported methods against the creation url.
pub async fn collection_method_not_allowed(method: Method) -> Response {
    method_not_allowed(&method, "file creation url", "POST")
}

/// Fallback for unsupported methods against an upload url.
pub async fn resource_method_not_allowed(method: Method) -> Response {
    method_not_allowed(&method, "file upload url", "HEAD,PATCH")
}

fn method_not_allowed(method: &Method, endpoint: &str, allowed: &'static str) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(ALLOW, allowed)],
        format!("{method} used against {endpoint}. Only {allowed} is allowed."),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_not_allowed_names_method_and_allowed_verbs() {
        let response = method_not_allowed(&Method::GET, "file creation url", "POST");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), "POST");
    }

    #[test]
    fn header_string_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("entity-length", "42".parse().unwrap());
        assert_eq!(
            header_string(&headers, "Entity-Length").as_deref(),
            Some("42")
        );
        assert_eq!(header_string(&headers, "offset"), None);
    }
}
