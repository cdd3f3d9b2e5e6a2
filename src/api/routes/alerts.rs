//! Alert read and transition endpoints

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::alerts::{Alert, AlertFilter};
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::{AlertStatus, Severity};

/// Query parameters for alert listing; every filter is optional and they
/// combine with AND semantics.
///
/// Values arrive as raw strings so an unrecognized status/severity maps to a
/// clean 400 instead of a generic query rejection.
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    status: Option<String>,
    server_id: Option<String>,
    severity: Option<String>,
}

impl AlertQuery {
    fn into_filter(self) -> ApiResult<AlertFilter> {
        let status = self
            .status
            .map(|s| s.parse::<AlertStatus>())
            .transpose()
            .map_err(ApiError::from)?;
        let severity = self
            .severity
            .map(|s| s.parse::<Severity>())
            .transpose()
            .map_err(ApiError::from)?;

        Ok(AlertFilter {
            status,
            server_id: self.server_id,
            severity,
        })
    }
}

/// GET /api/v1/alerts
pub async fn list_alerts(
    State(state): State<ApiState>,
    Query(query): Query<AlertQuery>,
) -> ApiResult<Json<Value>> {
    let filter = query.into_filter()?;
    let alerts = state.engine.alerts().list(&filter).await;

    Ok(Json(json!({
        "count": alerts.len(),
        "alerts": alerts,
    })))
}

/// GET /api/v1/alerts/:id
pub async fn get_alert(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(state.engine.alerts().get(id).await?))
}

/// PATCH body: the requested status, nothing else is mutable from outside.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    status: AlertStatus,
}

/// PATCH /api/v1/alerts/:id
///
/// Acknowledge or resolve an alert. Illegal transitions are rejected with
/// the record unchanged.
pub async fn update_alert_status(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> ApiResult<Json<Alert>> {
    let Json(update) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let alert = state.engine.set_alert_status(id, update.status).await?;
    Ok(Json(alert))
}
