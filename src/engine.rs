//! Ingestion engine tying the stores, evaluator and publisher together
//!
//! `MonitorEngine` is the context object handed to every collaborator: the
//! API layer, the ingestion caller (a server-agent poller in the full
//! dashboard) and the binaries. It is constructed once at process start; no
//! component reaches for process-wide singletons.
//!
//! ## Ordering
//!
//! Samples for one server are ingested and evaluated under a per-server
//! lock, so their effects land in timestamp order. Different servers only
//! share the lock map for a brief read and proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::alerts::{Alert, AlertStore, AlertTransition};
use crate::error::MonitorResult;
use crate::evaluator::Evaluator;
use crate::events::{EventPublisher, MonitorEvent};
use crate::store::TimeSeriesStore;
use crate::thresholds::{Threshold, ThresholdRegistry};
use crate::{AlertStatus, MetricSample};

pub struct MonitorEngine {
    series: Arc<TimeSeriesStore>,
    thresholds: Arc<ThresholdRegistry>,
    alerts: Arc<AlertStore>,
    evaluator: Evaluator,
    publisher: Arc<dyn EventPublisher>,
    ingest_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl MonitorEngine {
    pub fn new(
        series: Arc<TimeSeriesStore>,
        thresholds: Arc<ThresholdRegistry>,
        alerts: Arc<AlertStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let evaluator = Evaluator::new(thresholds.clone(), alerts.clone());
        Self {
            series,
            thresholds,
            alerts,
            evaluator,
            publisher,
            ingest_locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn series(&self) -> &TimeSeriesStore {
        &self.series
    }

    pub fn thresholds(&self) -> &ThresholdRegistry {
        &self.thresholds
    }

    pub fn alerts(&self) -> &AlertStore {
        &self.alerts
    }

    /// Ingest one sample: append, evaluate, publish.
    ///
    /// Evaluation completes before this returns. A rejected sample leaves
    /// every store untouched and publishes nothing. Returns the number of
    /// alert transitions the sample caused.
    #[instrument(skip_all, fields(server_id = %sample.server_id))]
    pub async fn ingest(&self, sample: MetricSample) -> MonitorResult<usize> {
        let lock = self.ingest_lock(&sample.server_id).await;
        let _guard = lock.lock().await;

        self.series.append(sample.clone()).await?;

        let transitions = self.evaluator.evaluate(&sample).await;
        let transition_count = transitions.len();

        self.publisher.publish(MonitorEvent::NewMetrics {
            server_id: sample.server_id.clone(),
            sample,
        });
        for transition in transitions {
            self.publisher.publish(match transition {
                AlertTransition::Created(alert) => MonitorEvent::AlertCreated { alert },
                AlertTransition::Updated(alert) => MonitorEvent::AlertUpdated { alert },
                AlertTransition::Resolved(alert) => MonitorEvent::AlertResolved { alert },
            });
        }

        Ok(transition_count)
    }

    /// Delete a threshold and force-resolve its open alerts.
    ///
    /// The cascade keeps the store free of open alerts with dangling
    /// threshold references; the resolved records persist for history.
    pub async fn delete_threshold(&self, id: Uuid) -> MonitorResult<Threshold> {
        let removed = self.thresholds.remove(id).await?;
        let resolved = self.alerts.resolve_open_for_threshold(id, Utc::now()).await;
        debug!(
            "deleted threshold {id}, cascade-resolved {} alert(s)",
            resolved.len()
        );
        for alert in resolved {
            self.publisher.publish(MonitorEvent::AlertResolved { alert });
        }
        Ok(removed)
    }

    /// Externally requested alert transition (acknowledge or resolve).
    ///
    /// Publishes the matching event so push subscribers see the same
    /// transition a poll would.
    pub async fn set_alert_status(
        &self,
        id: Uuid,
        new_status: AlertStatus,
    ) -> MonitorResult<Alert> {
        let alert = self.alerts.update_status(id, new_status).await?;
        self.publisher.publish(match new_status {
            AlertStatus::Resolved => MonitorEvent::AlertResolved {
                alert: alert.clone(),
            },
            _ => MonitorEvent::AlertUpdated {
                alert: alert.clone(),
            },
        });
        Ok(alert)
    }

    async fn ingest_lock(&self, server_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.ingest_locks.read().await;
            if let Some(lock) = locks.get(server_id) {
                return lock.clone();
            }
        }
        let mut locks = self.ingest_locks.write().await;
        locks.entry(server_id.to_string()).or_default().clone()
    }
}
