//! Alert records and their lifecycle store
//!
//! ## State machine
//!
//! ```text
//! (breach, nothing open)        -> active          alert_created
//! (breach, open alert)          -> status kept     alert_updated
//! (clear, open alert)           -> resolved        alert_resolved
//! active --ack-->                  acknowledged    (external operation)
//! resolved                         terminal - a later breach opens a NEW record
//! ```
//!
//! Acknowledgement is sticky: a re-breach never demotes `acknowledged` back
//! to `active`. At most one open alert exists per (threshold, server) pair;
//! the decision is taken inside the server partition's write lock, so two
//! concurrent breaches cannot both observe "nothing open".

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MonitorError, MonitorResult};
use crate::thresholds::Threshold;
use crate::{AlertStatus, MetricKind, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub threshold_id: Uuid,
    pub server_id: String,
    pub severity: Severity,
    pub metric: MetricKind,
    /// Most recent sample value that breached the threshold.
    pub triggering_value: f64,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// AND-combined query filter; `None` fields are ignored.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub server_id: Option<String>,
    pub severity: Option<Severity>,
}

impl AlertFilter {
    fn matches(&self, alert: &Alert) -> bool {
        self.status.is_none_or(|s| alert.status == s)
            && self
                .server_id
                .as_deref()
                .is_none_or(|id| alert.server_id == id)
            && self.severity.is_none_or(|s| alert.severity == s)
    }
}

/// Outcome of one evaluation step against one (threshold, server) pair.
#[derive(Debug, Clone)]
pub enum AlertTransition {
    Created(Alert),
    Updated(Alert),
    Resolved(Alert),
}

#[derive(Default)]
struct AlertPartition {
    records: HashMap<Uuid, Alert>,
    /// threshold id -> id of the single open alert for that threshold
    open: HashMap<Uuid, Uuid>,
}

/// Owner of all alert records, partitioned by server id.
#[derive(Default)]
pub struct AlertStore {
    partitions: RwLock<HashMap<String, Arc<RwLock<AlertPartition>>>>,
}

impl AlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the (threshold, server) pair for one evaluated sample.
    ///
    /// This is the evaluator's atomic step: create-if-absent on breach,
    /// refresh on re-breach, resolve on clear. Runs entirely under the
    /// server partition's write lock.
    pub async fn apply_breach(
        &self,
        threshold: &Threshold,
        server_id: &str,
        value: f64,
        breached: bool,
        now: DateTime<Utc>,
    ) -> Option<AlertTransition> {
        let partition = if breached {
            self.partition_or_create(server_id).await
        } else {
            // A clear sample with no partition has nothing to resolve.
            self.partition(server_id).await?
        };

        let mut partition = partition.write().await;
        match (partition.open.get(&threshold.id).copied(), breached) {
            (Some(alert_id), true) => {
                let alert = partition
                    .records
                    .get_mut(&alert_id)
                    .expect("open index entry has a record");
                alert.triggering_value = value;
                alert.updated_at = now;
                Some(AlertTransition::Updated(alert.clone()))
            }

            (Some(alert_id), false) => {
                let alert = partition
                    .records
                    .get_mut(&alert_id)
                    .expect("open index entry has a record");
                alert.status = AlertStatus::Resolved;
                alert.updated_at = now;
                alert.resolved_at = Some(now);
                let resolved = alert.clone();
                partition.open.remove(&threshold.id);
                debug!("alert {} resolved for {server_id}", resolved.id);
                Some(AlertTransition::Resolved(resolved))
            }

            (None, true) => {
                let alert = Alert {
                    id: Uuid::now_v7(),
                    threshold_id: threshold.id,
                    server_id: server_id.to_string(),
                    severity: threshold.severity,
                    metric: threshold.metric.clone(),
                    triggering_value: value,
                    status: AlertStatus::Active,
                    created_at: now,
                    updated_at: now,
                    resolved_at: None,
                };
                debug!(
                    "alert {} opened for {server_id}: {} {} {} (value {value})",
                    alert.id, threshold.metric, threshold.comparator, threshold.value
                );
                partition.open.insert(threshold.id, alert.id);
                partition.records.insert(alert.id, alert.clone());
                Some(AlertTransition::Created(alert))
            }

            (None, false) => None,
        }
    }

    /// Externally requested status change.
    ///
    /// Legal transitions: `active -> acknowledged`,
    /// `active | acknowledged -> resolved`. Anything else fails with
    /// `InvalidTransition` and leaves the record untouched.
    pub async fn update_status(&self, id: Uuid, new_status: AlertStatus) -> MonitorResult<Alert> {
        let partition = self
            .partition_containing(id)
            .await
            .ok_or_else(|| MonitorError::NotFound(format!("alert {id}")))?;
        let mut partition = partition.write().await;

        let alert = partition
            .records
            .get_mut(&id)
            .ok_or_else(|| MonitorError::NotFound(format!("alert {id}")))?;

        let legal = matches!(
            (alert.status, new_status),
            (AlertStatus::Active, AlertStatus::Acknowledged)
                | (AlertStatus::Active, AlertStatus::Resolved)
                | (AlertStatus::Acknowledged, AlertStatus::Resolved)
        );
        if !legal {
            return Err(MonitorError::InvalidTransition {
                from: alert.status,
                to: new_status,
            });
        }

        let now = Utc::now();
        alert.status = new_status;
        alert.updated_at = now;
        if new_status == AlertStatus::Resolved {
            alert.resolved_at = Some(now);
        }
        let updated = alert.clone();
        if new_status == AlertStatus::Resolved {
            partition.open.remove(&updated.threshold_id);
        }

        Ok(updated)
    }

    pub async fn get(&self, id: Uuid) -> MonitorResult<Alert> {
        let partition = self
            .partition_containing(id)
            .await
            .ok_or_else(|| MonitorError::NotFound(format!("alert {id}")))?;
        let partition = partition.read().await;
        partition
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(format!("alert {id}")))
    }

    /// All alerts matching the filter, ordered by creation time.
    pub async fn list(&self, filter: &AlertFilter) -> Vec<Alert> {
        let partitions = self.partitions.read().await;
        let mut matching = Vec::new();
        for partition in partitions.values() {
            let partition = partition.read().await;
            matching.extend(
                partition
                    .records
                    .values()
                    .filter(|a| filter.matches(a))
                    .cloned(),
            );
        }
        matching.sort_by_key(|a| (a.created_at, a.id));
        matching
    }

    /// Force-resolve every open alert referencing a deleted threshold.
    ///
    /// The records persist (resolved) for audit; only the open index entries
    /// are removed. Returns the resolved alerts so the engine can publish
    /// the matching events.
    pub async fn resolve_open_for_threshold(
        &self,
        threshold_id: Uuid,
        now: DateTime<Utc>,
    ) -> Vec<Alert> {
        let partitions: Vec<_> = {
            let map = self.partitions.read().await;
            map.values().cloned().collect()
        };

        let mut resolved = Vec::new();
        for partition in partitions {
            let mut partition = partition.write().await;
            let Some(alert_id) = partition.open.remove(&threshold_id) else {
                continue;
            };
            let alert = partition
                .records
                .get_mut(&alert_id)
                .expect("open index entry has a record");
            alert.status = AlertStatus::Resolved;
            alert.updated_at = now;
            alert.resolved_at = Some(now);
            resolved.push(alert.clone());
        }

        if !resolved.is_empty() {
            debug!(
                "cascade-resolved {} open alert(s) for deleted threshold {threshold_id}",
                resolved.len()
            );
        }
        resolved
    }

    pub async fn open_count(&self) -> usize {
        let partitions = self.partitions.read().await;
        let mut count = 0;
        for partition in partitions.values() {
            count += partition.read().await.open.len();
        }
        count
    }

    async fn partition(&self, server_id: &str) -> Option<Arc<RwLock<AlertPartition>>> {
        self.partitions.read().await.get(server_id).cloned()
    }

    async fn partition_or_create(&self, server_id: &str) -> Arc<RwLock<AlertPartition>> {
        {
            let partitions = self.partitions.read().await;
            if let Some(partition) = partitions.get(server_id) {
                return partition.clone();
            }
        }
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(server_id.to_string())
            .or_default()
            .clone()
    }

    async fn partition_containing(&self, id: Uuid) -> Option<Arc<RwLock<AlertPartition>>> {
        let partitions = self.partitions.read().await;
        for partition in partitions.values() {
            if partition.read().await.records.contains_key(&id) {
                return Some(partition.clone());
            }
        }
        None
    }
}
