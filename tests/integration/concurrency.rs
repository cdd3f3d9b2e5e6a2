//! Concurrency and race condition tests
//!
//! - the one-open-alert invariant under concurrent same-server ingestion
//! - independent per-server pipelines
//! - acknowledgement racing evaluation

use chrono::{Duration, Utc};
use panel_monitoring::{AlertStatus, Severity, TimeRange, alerts::AlertFilter};

use crate::helpers::*;

#[tokio::test]
async fn concurrent_breaches_never_open_two_alerts_for_one_pair() {
    let (engine, _fanout) = build_engine();
    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();

    let now = Utc::now();

    // Many tasks race breaching samples for the same server. Appends with an
    // out-of-order timestamp are rejected, which is fine - the point is that
    // every task that does evaluate sees the same open alert.
    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let _ = engine
                .ingest(sample("s1", now + Duration::milliseconds(i), 95.0))
                .await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(engine.alerts().open_count().await, 1);
    assert_eq!(engine.alerts().list(&Default::default()).await.len(), 1);
}

#[tokio::test]
async fn servers_ingest_independently_in_parallel() {
    let (engine, _fanout) = build_engine();
    let now = Utc::now();

    let mut tasks = Vec::new();
    for server in 0..10 {
        let engine = engine.clone();
        tasks.push(tokio::spawn(async move {
            let server_id = format!("server-{server}");
            for i in 0..20 {
                engine
                    .ingest(sample(&server_id, now + Duration::seconds(i), 30.0))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(engine.series().server_count().await, 10);
    for server in 0..10 {
        let samples = engine
            .series()
            .query_window(&format!("server-{server}"), TimeRange::LastHour)
            .await
            .unwrap();
        assert_eq!(samples.len(), 20);
        assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }
}

#[tokio::test]
async fn acknowledgement_racing_rebreach_stays_acknowledged() {
    let (engine, _fanout) = build_engine();
    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();

    let now = Utc::now();
    engine.ingest(sample("s1", now, 95.0)).await.unwrap();
    let open = engine.alerts().list(&Default::default()).await;
    let alert_id = open[0].id;

    let ack_engine = engine.clone();
    let ack = tokio::spawn(async move {
        ack_engine
            .set_alert_status(alert_id, AlertStatus::Acknowledged)
            .await
    });

    let ingest_engine = engine.clone();
    let rebreach = tokio::spawn(async move {
        for i in 1..=10 {
            ingest_engine
                .ingest(sample("s1", now + Duration::milliseconds(i), 96.0))
                .await
                .unwrap();
        }
    });

    ack.await.unwrap().unwrap();
    rebreach.await.unwrap();

    // However the two interleaved, the ack is sticky and the pair still has
    // exactly one open alert.
    let alert = engine.alerts().get(alert_id).await.unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert_eq!(engine.alerts().open_count().await, 1);
    assert_eq!(
        engine
            .alerts()
            .list(&AlertFilter {
                status: Some(AlertStatus::Active),
                ..Default::default()
            })
            .await
            .len(),
        0
    );
}
