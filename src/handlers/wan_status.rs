use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::*;
use crate::notify::NotificationReport;
use crate::status::IngestOutcome;
use crate::AppState;

use super::{ApiError, PaginationQuery};

#[derive(Serialize)]
pub struct IngestResponse {
    pub message: String,
    pub data: StatusReport,
    /// False when the report repeated the latest known status
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationReport>,
}

/// Accept a pushed interface status report from a router
pub async fn ingest_status(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StatusReport>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let report = payload
        .parse()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let (recorded, notification) = match state.reconciler.ingest(&report).await? {
        IngestOutcome::Recorded { notification, .. } => (true, Some(notification)),
        IngestOutcome::Unchanged { .. } => (false, None),
    };

    Ok(Json(IngestResponse {
        message: "Data saved successfully".to_string(),
        data: payload,
        recorded,
        notification,
    }))
}

/// List every stored observation, newest first
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<Vec<InterfaceObservation>>, ApiError> {
    let (limit, offset) = page.sanitize();
    let observations = state.store.list_observations(limit, offset).await?;
    Ok(Json(observations))
}

/// Full transition history for one device, newest first
pub async fn device_history(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<InterfaceObservation>>, ApiError> {
    let observations = state.store.observation_history(&device_id).await?;
    Ok(Json(observations))
}

/// Latest observation per interface for one device
pub async fn device_latest(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<LatestByLabel>, ApiError> {
    let latest = state.store.latest_per_interface(&device_id).await?;
    Ok(Json(latest))
}
