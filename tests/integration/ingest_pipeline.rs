//! End-to-end ingest pipeline tests
//!
//! Sample in, series append, evaluation, event fan-out - through the public
//! engine interface only.

use chrono::{Duration, Utc};
use panel_monitoring::{
    Severity, TimeRange,
    error::MonitorError,
    events::{MonitorEvent, SubscriptionFilter},
};

use crate::helpers::*;

#[tokio::test]
async fn ingested_samples_are_queryable_in_order() {
    let (engine, _fanout) = build_engine();
    let now = Utc::now();

    for i in 0..5 {
        engine
            .ingest(sample("mc-survival", now - Duration::minutes(5 - i), 20.0))
            .await
            .unwrap();
    }

    let samples = engine
        .series()
        .query_window("mc-survival", TimeRange::LastHour)
        .await
        .unwrap();

    assert_eq!(samples.len(), 5);
    assert!(samples.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn unknown_server_query_fails_while_ingested_server_succeeds() {
    let (engine, _fanout) = build_engine();
    engine
        .ingest(sample("mc-survival", Utc::now(), 20.0))
        .await
        .unwrap();

    assert!(matches!(
        engine.series().query_window("ghost", TimeRange::LastHour).await,
        Err(MonitorError::UnknownServer(_))
    ));
    assert!(
        engine
            .series()
            .query_window("mc-survival", TimeRange::LastHour)
            .await
            .is_ok()
    );
}

#[tokio::test]
async fn stale_sample_is_rejected_and_nothing_is_published() {
    let (engine, fanout) = build_engine();
    let now = Utc::now();

    engine.ingest(sample("s1", now, 20.0)).await.unwrap();

    let mut sub = fanout.subscribe(SubscriptionFilter::default()).await;

    let err = engine.ingest(sample("s1", now, 30.0)).await;
    assert!(matches!(err, Err(MonitorError::InvalidSample(_))));

    // The series still holds exactly the first sample.
    let samples = engine
        .series()
        .query_window("s1", TimeRange::LastHour)
        .await
        .unwrap();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].cpu_usage, 20.0);

    // And the rejected ingest emitted no event: the next event observed is
    // the one from a subsequent valid ingest.
    engine
        .ingest(sample("s1", now + Duration::seconds(1), 40.0))
        .await
        .unwrap();
    let event = sub.events.recv().await.unwrap();
    let MonitorEvent::NewMetrics { sample, .. } = event else {
        panic!("expected a metrics event");
    };
    assert_eq!(sample.cpu_usage, 40.0);
}

#[tokio::test]
async fn breach_sequence_fans_out_created_updated_resolved() {
    let (engine, fanout) = build_engine();
    engine
        .thresholds()
        .create(cpu_threshold(90.0, Severity::Critical))
        .await
        .unwrap();

    let mut sub = fanout
        .subscribe(SubscriptionFilter::from_kinds("alerts", None).unwrap())
        .await;

    let now = Utc::now();
    engine.ingest(sample("s1", now, 95.0)).await.unwrap();
    engine
        .ingest(sample("s1", now + Duration::seconds(5), 96.0))
        .await
        .unwrap();
    engine
        .ingest(sample("s1", now + Duration::seconds(10), 80.0))
        .await
        .unwrap();

    let MonitorEvent::AlertCreated { alert: created } = sub.events.recv().await.unwrap() else {
        panic!("expected alert_created first");
    };
    assert_eq!(created.triggering_value, 95.0);

    let MonitorEvent::AlertUpdated { alert: updated } = sub.events.recv().await.unwrap() else {
        panic!("expected alert_updated second");
    };
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.triggering_value, 96.0);

    let MonitorEvent::AlertResolved { alert: resolved } = sub.events.recv().await.unwrap() else {
        panic!("expected alert_resolved third");
    };
    assert_eq!(resolved.id, created.id);
    assert!(resolved.resolved_at.is_some());

    // Exactly one alert record across the whole sequence.
    assert_eq!(
        engine.alerts().list(&Default::default()).await.len(),
        1
    );
}

#[tokio::test]
async fn subscription_server_filter_narrows_the_stream() {
    let (engine, fanout) = build_engine();

    let mut sub = fanout
        .subscribe(SubscriptionFilter {
            metrics: true,
            alerts: true,
            server_id: Some("valheim".to_string()),
        })
        .await;

    let now = Utc::now();
    engine.ingest(sample("mc-survival", now, 10.0)).await.unwrap();
    engine.ingest(sample("valheim", now, 10.0)).await.unwrap();

    let event = sub.events.recv().await.unwrap();
    assert_eq!(event.server_id(), "valheim");
}
