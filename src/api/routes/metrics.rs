//! Time-series query endpoints

use axum::{
    Json,
    extract::{Query, State},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::TimeRange;
use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};

/// Query parameters for a metric time range
#[derive(Debug, Deserialize)]
pub struct MetricQuery {
    /// Server whose series to query (required)
    server_id: Option<String>,

    /// Relative window (`1h`, `24h`, `7d`, `30d`); overrides start/end
    range: Option<String>,

    /// Start time (ISO 8601, default: 1 hour ago)
    start: Option<DateTime<Utc>>,

    /// End time (ISO 8601, default: now)
    end: Option<DateTime<Utc>>,
}

/// GET /api/v1/metrics
///
/// Samples for one server within a window, ascending by timestamp.
pub async fn get_metrics(
    State(state): State<ApiState>,
    Query(query): Query<MetricQuery>,
) -> ApiResult<Json<Value>> {
    let server_id = query
        .server_id
        .ok_or_else(|| ApiError::InvalidRequest("missing server_id".to_string()))?;

    let (start, end) = match query.range.as_deref() {
        Some(range) => {
            let range: TimeRange = range.parse().map_err(ApiError::from)?;
            range.window(Utc::now())
        }
        None => {
            let end = query.end.unwrap_or_else(Utc::now);
            let start = query.start.unwrap_or_else(|| end - Duration::hours(1));
            (start, end)
        }
    };

    let samples = state.engine.series().query(&server_id, start, end).await?;

    Ok(Json(json!({
        "server_id": server_id,
        "start": start.to_rfc3339(),
        "end": end.to_rfc3339(),
        "count": samples.len(),
        "samples": samples,
    })))
}

/// GET /api/v1/servers
///
/// All servers with a series, with sizes and latest timestamps.
pub async fn list_servers(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let servers = state.engine.series().servers().await;

    Ok(Json(json!({
        "count": servers.len(),
        "servers": servers,
    })))
}
