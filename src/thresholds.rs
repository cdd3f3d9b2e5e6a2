//! Threshold definitions and their registry
//!
//! Thresholds are runtime-editable rules comparing one metric against a
//! value. The registry is the only writer; the evaluator only ever reads
//! resolved snapshots, and deleting a threshold is cascaded by the engine so
//! no open alert keeps a dangling reference.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{MonitorError, MonitorResult};
use crate::{Comparator, MetricKind, Severity, ThresholdScope};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Threshold {
    pub id: Uuid,
    /// `"*"` applies the rule to every server.
    #[serde(rename = "server_id")]
    pub scope: ThresholdScope,
    pub metric: MetricKind,
    pub comparator: Comparator,
    pub value: f64,
    pub severity: Severity,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Creation payload; id and timestamps are assigned by the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct NewThreshold {
    #[serde(rename = "server_id", default = "default_scope")]
    pub scope: ThresholdScope,
    pub metric: MetricKind,
    pub comparator: Comparator,
    pub value: f64,
    pub severity: Severity,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_scope() -> ThresholdScope {
    ThresholdScope::All
}

fn default_enabled() -> bool {
    true
}

/// Partial update; absent fields keep their current value.
///
/// `id` and `created_at` are immutable and have no counterpart here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThresholdUpdate {
    #[serde(rename = "server_id")]
    pub scope: Option<ThresholdScope>,
    pub metric: Option<MetricKind>,
    pub comparator: Option<Comparator>,
    pub value: Option<f64>,
    pub severity: Option<Severity>,
    pub enabled: Option<bool>,
}

impl ThresholdUpdate {
    fn is_empty(&self) -> bool {
        self.scope.is_none()
            && self.metric.is_none()
            && self.comparator.is_none()
            && self.value.is_none()
            && self.severity.is_none()
            && self.enabled.is_none()
    }
}

fn validate_rule(metric: &MetricKind, value: f64) -> MonitorResult<()> {
    if !value.is_finite() {
        return Err(MonitorError::Validation(
            "threshold value must be a finite number".to_string(),
        ));
    }
    if let MetricKind::Custom(name) = metric
        && name.trim().is_empty()
    {
        return Err(MonitorError::Validation(
            "custom metric must name a counter".to_string(),
        ));
    }
    Ok(())
}

/// Owner of all threshold definitions.
#[derive(Default)]
pub struct ThresholdRegistry {
    thresholds: RwLock<HashMap<Uuid, Threshold>>,
}

impl ThresholdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, spec: NewThreshold) -> MonitorResult<Threshold> {
        validate_rule(&spec.metric, spec.value)?;

        let now = Utc::now();
        let threshold = Threshold {
            id: Uuid::now_v7(),
            scope: spec.scope,
            metric: spec.metric,
            comparator: spec.comparator,
            value: spec.value,
            severity: spec.severity,
            enabled: spec.enabled,
            created_at: now,
            updated_at: now,
        };

        debug!(
            "created threshold {}: {} {} {} ({})",
            threshold.id, threshold.metric, threshold.comparator, threshold.value, threshold.scope
        );

        let mut thresholds = self.thresholds.write().await;
        thresholds.insert(threshold.id, threshold.clone());
        Ok(threshold)
    }

    /// Merge a partial update into an existing threshold.
    pub async fn update(&self, id: Uuid, patch: ThresholdUpdate) -> MonitorResult<Threshold> {
        if patch.is_empty() {
            return Err(MonitorError::Validation(
                "update contains no recognized fields".to_string(),
            ));
        }

        let mut thresholds = self.thresholds.write().await;
        let threshold = thresholds
            .get_mut(&id)
            .ok_or_else(|| MonitorError::NotFound(format!("threshold {id}")))?;

        let metric = patch.metric.clone().unwrap_or_else(|| threshold.metric.clone());
        let value = patch.value.unwrap_or(threshold.value);
        validate_rule(&metric, value)?;

        if let Some(scope) = patch.scope {
            threshold.scope = scope;
        }
        threshold.metric = metric;
        if let Some(comparator) = patch.comparator {
            threshold.comparator = comparator;
        }
        threshold.value = value;
        if let Some(severity) = patch.severity {
            threshold.severity = severity;
        }
        if let Some(enabled) = patch.enabled {
            threshold.enabled = enabled;
        }
        threshold.updated_at = Utc::now();

        Ok(threshold.clone())
    }

    /// Remove a threshold, returning it for the engine's alert cascade.
    pub async fn remove(&self, id: Uuid) -> MonitorResult<Threshold> {
        let mut thresholds = self.thresholds.write().await;
        thresholds
            .remove(&id)
            .ok_or_else(|| MonitorError::NotFound(format!("threshold {id}")))
    }

    pub async fn get(&self, id: Uuid) -> MonitorResult<Threshold> {
        let thresholds = self.thresholds.read().await;
        thresholds
            .get(&id)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(format!("threshold {id}")))
    }

    /// All thresholds, ordered by creation time.
    pub async fn list(&self) -> Vec<Threshold> {
        let thresholds = self.thresholds.read().await;
        let mut all: Vec<_> = thresholds.values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        all
    }

    /// Enabled thresholds whose scope covers the given server.
    ///
    /// This is the evaluator's read path; the snapshot keeps evaluation
    /// independent of registry writes happening in parallel.
    pub async fn applicable(&self, server_id: &str) -> Vec<Threshold> {
        let thresholds = self.thresholds.read().await;
        thresholds
            .values()
            .filter(|t| t.enabled && t.scope.matches(server_id))
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.thresholds.read().await.len()
    }
}
