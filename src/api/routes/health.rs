//! Health check endpoint

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::state::ApiState;

/// GET /api/v1/health
///
/// Liveness plus a few engine counters for dashboards.
pub async fn health_check(State(state): State<ApiState>) -> Json<Value> {
    let servers = state.engine.series().server_count().await;
    let thresholds = state.engine.thresholds().len().await;
    let open_alerts = state.engine.alerts().open_count().await;
    let subscribers = state.fanout.subscriber_count().await;

    Json(json!({
        "status": "ok",
        "servers": servers,
        "thresholds": thresholds,
        "open_alerts": open_alerts,
        "subscribers": subscribers,
    }))
}
