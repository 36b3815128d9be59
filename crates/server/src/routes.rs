//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, head, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// The upload surface is a two-level hierarchy under the configured base
/// path; any other verb on either level answers 405 with the allowed verbs.
pub fn create_router(state: AppState) -> Router {
    let base = state.config.server.base_path.clone();

    let mut router = Router::new()
        .route(
            &base,
            post(handlers::create_upload).fallback(handlers::collection_method_not_allowed),
        )
        .route(
            &format!("{base}/{{id}}"),
            head(handlers::upload_status)
                .patch(handlers::apply_chunk)
                .fallback(handlers::resource_method_not_allowed),
        )
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check));

    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
