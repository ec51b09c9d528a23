use axum::{extract::State, Json};
use std::sync::Arc;

use crate::models::SweepReport;
use crate::AppState;

use super::ApiError;

/// Latest fleet sweep taken by the background poller
pub async fn snapshot(State(state): State<Arc<AppState>>) -> Result<Json<SweepReport>, ApiError> {
    state
        .snapshot
        .latest()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::service_unavailable("no sweep has completed yet"))
}
