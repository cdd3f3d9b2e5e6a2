//! Threshold registry endpoints

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::thresholds::{NewThreshold, Threshold, ThresholdUpdate};

/// GET /api/v1/thresholds
pub async fn list_thresholds(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let thresholds = state.engine.thresholds().list().await;

    Ok(Json(json!({
        "count": thresholds.len(),
        "thresholds": thresholds,
    })))
}

/// POST /api/v1/thresholds
///
/// Body validation happens in two layers: the closed enums reject
/// unrecognized comparators/metrics at deserialization, the registry
/// rejects non-finite values and anonymous custom metrics.
pub async fn create_threshold(
    State(state): State<ApiState>,
    payload: Result<Json<NewThreshold>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Threshold>)> {
    let Json(spec) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let threshold = state.engine.thresholds().create(spec).await?;
    Ok((StatusCode::CREATED, Json(threshold)))
}

/// GET /api/v1/thresholds/:id
pub async fn get_threshold(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Threshold>> {
    Ok(Json(state.engine.thresholds().get(id).await?))
}

/// PATCH /api/v1/thresholds/:id
pub async fn update_threshold(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ThresholdUpdate>, JsonRejection>,
) -> ApiResult<Json<Threshold>> {
    let Json(patch) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    Ok(Json(state.engine.thresholds().update(id, patch).await?))
}

/// DELETE /api/v1/thresholds/:id
///
/// Goes through the engine so open alerts referencing the threshold are
/// force-resolved and the matching events published.
pub async fn delete_threshold(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let removed = state.engine.delete_threshold(id).await?;

    Ok(Json(json!({
        "deleted": removed,
    })))
}
