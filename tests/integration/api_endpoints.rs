//! Integration tests for API endpoints
//!
//! A real server is spawned on a random port for every test; assertions go
//! through reqwest like any external collaborator would.

use std::sync::Arc;

use chrono::{Duration, Utc};
use panel_monitoring::{
    Severity,
    api::{ApiConfig, ApiState, spawn_api_server},
    engine::MonitorEngine,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::helpers::*;

async fn spawn_test_api() -> (String, Arc<MonitorEngine>) {
    let (engine, fanout) = build_engine();

    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        enable_cors: false,
    };
    let addr = spawn_api_server(config, ApiState::new(engine.clone(), fanout))
        .await
        .unwrap();

    (format!("http://{addr}"), engine)
}

#[tokio::test]
async fn metrics_endpoint_requires_server_id_and_knows_its_servers() {
    let (base, engine) = spawn_test_api().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{base}/api/v1/metrics"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .get(format!("{base}/api/v1/metrics?server_id=ghost"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let now = Utc::now();
    engine.ingest(sample("mc-survival", now - Duration::minutes(1), 10.0)).await.unwrap();
    engine.ingest(sample("mc-survival", now, 20.0)).await.unwrap();

    let body: Value = client
        .get(format!("{base}/api/v1/metrics?server_id=mc-survival&range=1h"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 2);
    assert_eq!(body["samples"][1]["cpu_usage"], 20.0);

    let response = client
        .get(format!("{base}/api/v1/metrics?server_id=mc-survival&range=5m"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = client
        .get(format!("{base}/api/v1/servers"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["servers"][0]["server_id"], "mc-survival");
}

#[tokio::test]
async fn threshold_crud_with_boundary_validation() {
    let (base, _engine) = spawn_test_api().await;
    let client = reqwest::Client::new();

    // Unrecognized comparator is rejected by the closed enum.
    let response = client
        .post(format!("{base}/api/v1/thresholds"))
        .json(&json!({
            "server_id": "*",
            "metric": "cpu",
            "comparator": "!=",
            "value": 90.0,
            "severity": "critical"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .post(format!("{base}/api/v1/thresholds"))
        .json(&json!({
            "server_id": "*",
            "metric": "cpu",
            "comparator": ">",
            "value": 90.0,
            "severity": "critical"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["enabled"], true);

    // Partial update merges.
    let updated: Value = client
        .patch(format!("{base}/api/v1/thresholds/{id}"))
        .json(&json!({ "value": 95.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["value"], 95.0);
    assert_eq!(updated["comparator"], ">");
    assert_eq!(updated["created_at"], created["created_at"]);

    let response = client
        .patch(format!(
            "{base}/api/v1/thresholds/00000000-0000-0000-0000-000000000000"
        ))
        .json(&json!({ "value": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client
        .delete(format!("{base}/api/v1/thresholds/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{base}/api/v1/thresholds/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_threshold_over_http_cascades_to_alerts() {
    let (base, engine) = spawn_test_api().await;
    let client = reqwest::Client::new();

    let threshold = engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();
    engine.ingest(sample("s1", Utc::now(), 95.0)).await.unwrap();

    let body: Value = client
        .get(format!("{base}/api/v1/alerts?status=active"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);

    let response = client
        .delete(format!("{base}/api/v1/thresholds/{}", threshold.id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = client
        .get(format!("{base}/api/v1/alerts?status=resolved"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    assert!(body["alerts"][0]["resolved_at"].is_string());
}

#[tokio::test]
async fn alert_filters_and_guarded_transitions() {
    let (base, engine) = spawn_test_api().await;
    let client = reqwest::Client::new();

    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();
    engine
        .thresholds()
        .create(cpu_threshold(50.0, Severity::Warning))
        .await
        .unwrap();
    engine.ingest(sample("s1", Utc::now(), 95.0)).await.unwrap();

    // Unrecognized filter value is a 400, not an empty result.
    let response = client
        .get(format!("{base}/api/v1/alerts?status=snoozed"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = client
        .get(format!("{base}/api/v1/alerts?status=active&severity=critical"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["count"], 1);
    let id = body["alerts"][0]["id"].as_str().unwrap().to_string();

    // Body outside the three recognized statuses is a 400.
    let response = client
        .patch(format!("{base}/api/v1/alerts/{id}"))
        .json(&json!({ "status": "muted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let acknowledged: Value = client
        .patch(format!("{base}/api/v1/alerts/{id}"))
        .json(&json!({ "status": "acknowledged" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(acknowledged["status"], "acknowledged");

    let resolved: Value = client
        .patch(format!("{base}/api/v1/alerts/{id}"))
        .json(&json!({ "status": "resolved" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resolved["status"], "resolved");

    // Resolved is terminal.
    let response = client
        .patch(format!("{base}/api/v1/alerts/{id}"))
        .json(&json!({ "status": "acknowledged" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = client
        .patch(format!(
            "{base}/api/v1/alerts/00000000-0000-0000-0000-000000000000"
        ))
        .json(&json!({ "status": "acknowledged" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_engine_counters() {
    let (base, engine) = spawn_test_api().await;

    engine.ingest(sample("s1", Utc::now(), 10.0)).await.unwrap();

    let body: Value = reqwest::get(format!("{base}/api/v1/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["servers"], 1);
    assert_eq!(body["open_alerts"], 0);
}
