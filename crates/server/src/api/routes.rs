use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{handlers, predictions};
use crate::state::AppState;

/// Largest accepted image upload.
const UPLOAD_BODY_LIMIT: usize = 32 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Recognition
        .route("/pipeline", get(predictions::get_status))
        .route("/predictions", post(predictions::predict))
        .route(
            "/predictions/upload",
            post(predictions::upload_prediction).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
