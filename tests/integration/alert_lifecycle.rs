//! Alert lifecycle tests through the engine surface

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use panel_monitoring::{
    AlertStatus, Severity,
    alerts::AlertFilter,
    error::MonitorError,
    events::{MonitorEvent, SubscriptionFilter},
};

use crate::helpers::*;

#[tokio::test]
async fn acknowledgement_survives_rebreach_and_clears_on_recovery() {
    let (engine, _fanout) = build_engine();
    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();

    let now = Utc::now();
    engine.ingest(sample("s1", now, 95.0)).await.unwrap();

    let open = engine
        .alerts()
        .list(&AlertFilter {
            status: Some(AlertStatus::Active),
            ..Default::default()
        })
        .await;
    assert_eq!(open.len(), 1);

    engine
        .set_alert_status(open[0].id, AlertStatus::Acknowledged)
        .await
        .unwrap();

    // Re-breach: still acknowledged, value refreshed.
    engine
        .ingest(sample("s1", now + Duration::seconds(5), 97.0))
        .await
        .unwrap();
    let alert = engine.alerts().get(open[0].id).await.unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert_eq!(alert.triggering_value, 97.0);

    // Recovery resolves it.
    engine
        .ingest(sample("s1", now + Duration::seconds(10), 50.0))
        .await
        .unwrap();
    let alert = engine.alerts().get(open[0].id).await.unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert!(alert.resolved_at.is_some());
}

#[tokio::test]
async fn rebreach_after_resolution_opens_a_second_record() {
    let (engine, _fanout) = build_engine();
    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Warning))
        .await
        .unwrap();

    let now = Utc::now();
    engine.ingest(sample("s1", now, 95.0)).await.unwrap();
    engine
        .ingest(sample("s1", now + Duration::seconds(1), 10.0))
        .await
        .unwrap();
    engine
        .ingest(sample("s1", now + Duration::seconds(2), 99.0))
        .await
        .unwrap();

    let all = engine.alerts().list(&Default::default()).await;
    assert_eq!(all.len(), 2);

    let open = engine
        .alerts()
        .list(&AlertFilter {
            status: Some(AlertStatus::Active),
            ..Default::default()
        })
        .await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].triggering_value, 99.0);
}

#[tokio::test]
async fn deleting_a_threshold_resolves_its_open_alerts_and_publishes() {
    let (engine, fanout) = build_engine();
    let threshold = engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();

    let now = Utc::now();
    engine.ingest(sample("s1", now, 95.0)).await.unwrap();
    engine.ingest(sample("s2", now, 96.0)).await.unwrap();

    let mut sub = fanout
        .subscribe(SubscriptionFilter::from_kinds("alerts", None).unwrap())
        .await;

    engine.delete_threshold(threshold.id).await.unwrap();

    // Both open alerts were force-resolved and both resolutions published.
    for _ in 0..2 {
        let MonitorEvent::AlertResolved { alert } = sub.events.recv().await.unwrap() else {
            panic!("expected alert_resolved");
        };
        assert_eq!(alert.status, AlertStatus::Resolved);
        assert!(alert.resolved_at.is_some());
    }

    // Records persist for history; nothing is open anymore.
    let all = engine.alerts().list(&Default::default()).await;
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|a| a.status == AlertStatus::Resolved));

    // A breach after deletion no longer opens anything.
    engine
        .ingest(sample("s1", now + Duration::seconds(5), 99.0))
        .await
        .unwrap();
    assert_eq!(engine.alerts().open_count().await, 0);
}

#[tokio::test]
async fn status_filters_combine_with_and_semantics() {
    let (engine, _fanout) = build_engine();
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

    let now = Utc::now();
    // 95 breaches both thresholds on s1; 60 breaches only the warning one on s2.
    engine.ingest(sample("s1", now, 95.0)).await.unwrap();
    engine.ingest(sample("s2", now, 60.0)).await.unwrap();

    let active_critical = engine
        .alerts()
        .list(&AlertFilter {
            status: Some(AlertStatus::Active),
            severity: Some(Severity::Critical),
            ..Default::default()
        })
        .await;
    assert_eq!(active_critical.len(), 1);
    assert_eq!(active_critical[0].server_id, "s1");

    let s2_alerts = engine
        .alerts()
        .list(&AlertFilter {
            server_id: Some("s2".to_string()),
            ..Default::default()
        })
        .await;
    assert_eq!(s2_alerts.len(), 1);
    assert_eq!(s2_alerts[0].severity, Severity::Warning);
}

#[tokio::test]
async fn manual_resolution_is_published_and_terminal() {
    let (engine, fanout) = build_engine();
    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();

    engine.ingest(sample("s1", Utc::now(), 95.0)).await.unwrap();
    let open = engine.alerts().list(&Default::default()).await;

    let mut sub = fanout
        .subscribe(SubscriptionFilter::from_kinds("alerts", None).unwrap())
        .await;

    engine
        .set_alert_status(open[0].id, AlertStatus::Resolved)
        .await
        .unwrap();

    let MonitorEvent::AlertResolved { alert } = sub.events.recv().await.unwrap() else {
        panic!("expected alert_resolved");
    };
    assert_eq!(alert.id, open[0].id);

    let err = engine
        .set_alert_status(open[0].id, AlertStatus::Active)
        .await;
    assert_matches!(err, Err(MonitorError::InvalidTransition { .. }));
}
