//! Health check handler.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

/// GET /v1/health - Liveness probe checking both stores.
///
/// Intentionally unauthenticated for load balancers and k8s probes.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .content
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(format!("content store unhealthy: {e}")))?;
    state
        .records
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(format!("record store unhealthy: {e}")))?;

    Ok(Json(json!({ "status": "ok" })))
}
