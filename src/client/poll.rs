//! REST polling source
//!
//! Turns one-shot REST snapshots into the same `MonitorEvent`s the push
//! channel carries. Metric events are deduplicated with a per-server
//! last-seen timestamp cursor (timestamps are strictly increasing within a
//! series, so the cursor is exact); alert transitions are diffed against the
//! last known state of every alert id.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::alerts::Alert;
use crate::events::MonitorEvent;
use crate::{AlertStatus, MetricSample};

/// One-shot pull of the hub's current state, as events.
///
/// Implementations keep their own cursors so repeated polls only emit what
/// changed since the previous call.
#[async_trait]
pub trait PullSource: Send {
    async fn poll_metrics(&mut self) -> Result<Vec<MonitorEvent>>;
    async fn poll_alerts(&mut self) -> Result<Vec<MonitorEvent>>;
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    servers: Vec<ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    server_id: String,
}

#[derive(Debug, Deserialize)]
struct MetricsResponse {
    samples: Vec<MetricSample>,
}

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct KnownAlert {
    status: AlertStatus,
    updated_at: DateTime<Utc>,
}

/// Polling client against the hub REST API
pub struct HttpPoller {
    client: reqwest::Client,
    base_url: String,
    /// Restrict polls to one server; `None` polls every known server.
    server_filter: Option<String>,
    last_seen: HashMap<String, DateTime<Utc>>,
    known_alerts: HashMap<Uuid, KnownAlert>,
    synced_once: bool,
}

impl HttpPoller {
    pub fn new(api_url: &str, server_filter: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: api_url.trim_end_matches('/').to_string(),
            server_filter,
            last_seen: HashMap::new(),
            known_alerts: HashMap::new(),
            synced_once: false,
        }
    }

    async fn server_ids(&self) -> Result<Vec<String>> {
        if let Some(server_id) = &self.server_filter {
            return Ok(vec![server_id.clone()]);
        }

        let response = self
            .client
            .get(format!("{}/api/v1/servers", self.base_url))
            .send()
            .await
            .context("server listing request failed")?
            .error_for_status()?
            .json::<ServersResponse>()
            .await?;

        Ok(response.servers.into_iter().map(|s| s.server_id).collect())
    }

    async fn fetch_samples(&self, server_id: &str) -> Result<Vec<MetricSample>> {
        let response = self
            .client
            .get(format!(
                "{}/api/v1/metrics?server_id={server_id}&range=1h",
                self.base_url
            ))
            .send()
            .await
            .context("metrics request failed")?;

        // A server the hub has not seen yet is not a poll failure.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }

        Ok(response.error_for_status()?.json::<MetricsResponse>().await?.samples)
    }

    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        let mut url = format!("{}/api/v1/alerts", self.base_url);
        if let Some(server_id) = &self.server_filter {
            url.push_str(&format!("?server_id={server_id}"));
        }

        Ok(self
            .client
            .get(url)
            .send()
            .await
            .context("alerts request failed")?
            .error_for_status()?
            .json::<AlertsResponse>()
            .await?
            .alerts)
    }
}

#[async_trait]
impl PullSource for HttpPoller {
    async fn poll_metrics(&mut self) -> Result<Vec<MonitorEvent>> {
        let mut events = Vec::new();

        for server_id in self.server_ids().await? {
            let samples = self.fetch_samples(&server_id).await?;

            match self.last_seen.get(&server_id).copied() {
                Some(cursor) => {
                    for sample in samples.into_iter().filter(|s| s.timestamp > cursor) {
                        self.last_seen.insert(server_id.clone(), sample.timestamp);
                        events.push(MonitorEvent::NewMetrics {
                            server_id: server_id.clone(),
                            sample,
                        });
                    }
                }
                None => {
                    // First poll seeds the cursor from the latest sample;
                    // only current state is emitted, not the whole window.
                    if let Some(latest) = samples.into_iter().next_back() {
                        self.last_seen.insert(server_id.clone(), latest.timestamp);
                        events.push(MonitorEvent::NewMetrics {
                            server_id: server_id.clone(),
                            sample: latest,
                        });
                    }
                }
            }
        }

        trace!("metrics poll produced {} event(s)", events.len());
        Ok(events)
    }

    async fn poll_alerts(&mut self) -> Result<Vec<MonitorEvent>> {
        let alerts = self.fetch_alerts().await?;
        let mut events = Vec::new();

        for alert in alerts {
            let current = KnownAlert {
                status: alert.status,
                updated_at: alert.updated_at,
            };

            match self.known_alerts.insert(alert.id, current) {
                None => {
                    // Baseline poll records state without emitting history.
                    if self.synced_once {
                        events.push(match alert.status {
                            AlertStatus::Resolved => MonitorEvent::AlertResolved { alert },
                            _ => MonitorEvent::AlertCreated { alert },
                        });
                    }
                }
                Some(previous) if previous == current => {}
                Some(previous) => {
                    debug!(
                        "alert {} changed: {} -> {}",
                        alert.id, previous.status, alert.status
                    );
                    events.push(match alert.status {
                        AlertStatus::Resolved => MonitorEvent::AlertResolved { alert },
                        _ => MonitorEvent::AlertUpdated { alert },
                    });
                }
            }
        }

        self.synced_once = true;
        trace!("alerts poll produced {} event(s)", events.len());
        Ok(events)
    }
}
