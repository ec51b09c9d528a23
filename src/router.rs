use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // WAN status routes
        .route("/api/wanstatus", post(handlers::wan_status::ingest_status))
        .route("/api/wanstatus/all", get(handlers::wan_status::list_all))
        .route("/api/wanstatus/:device_id", get(handlers::wan_status::device_history))
        .route("/api/wanstatus/:device_id/latest", get(handlers::wan_status::device_latest))
        // Device routes
        .route("/api/devices", get(handlers::devices::list_devices))
        .route("/api/devices/counts", get(handlers::devices::counts))
        .route("/api/devices/counts/live", get(handlers::devices::live_counts))
        .route("/api/devices/counts/probe", post(handlers::devices::probe_counts))
        .route("/api/devices/:device_id/health", get(handlers::devices::device_health))
        // Fleet status
        .route("/api/status/snapshot", get(handlers::status::snapshot))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
