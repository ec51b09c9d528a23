use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::ApiError;

/// List devices in a scope
pub async fn list_devices(
    State(state): State<Arc<AppState>>,
    Query(scope): Query<ScopeQuery>,
) -> Result<Json<Vec<Device>>, ApiError> {
    let devices = state.store.list_devices(DeviceScope::from(&scope)).await?;
    Ok(Json(devices))
}

/// Online/offline/partial counts from the session router and stored history
pub async fn counts(
    State(state): State<Arc<AppState>>,
    Query(scope): Query<ScopeQuery>,
) -> Result<Json<StatusCounts>, ApiError> {
    let counts = state.counter.count(DeviceScope::from(&scope)).await?;
    Ok(Json(counts))
}

/// Counts from each device's own router
pub async fn live_counts(
    State(state): State<Arc<AppState>>,
    Query(scope): Query<ScopeQuery>,
) -> Result<Json<StatusCounts>, ApiError> {
    let counts = state.counter.count_live(DeviceScope::from(&scope)).await?;
    Ok(Json(counts))
}

/// Counts for every device against a caller-supplied session router
pub async fn probe_counts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProbeRouterRequest>, JsonRejection>,
) -> Result<Json<StatusCounts>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if req.ip.trim().is_empty() {
        return Err(ApiError::bad_request("ip is required"));
    }

    let endpoint = RouterEndpoint::from(req);
    tracing::info!("Counting devices against session router {}", endpoint);
    let counts = state
        .counter
        .count_with_router(DeviceScope::All, &endpoint)
        .await?;
    Ok(Json(counts))
}

/// Live health of one device, with uplink addresses and the router's own name
pub async fn device_health(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceHealth>, ApiError> {
    let device = state.store.get_device(&device_id).await?;
    Ok(Json(state.reconciler.inspect(&device).await))
}
