//! Threshold evaluation against incoming samples
//!
//! Runs synchronously inside the ingest path: every accepted sample is
//! checked against all applicable thresholds before ingest returns, so
//! callers always observe a consistent post-state.

use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, trace};

use crate::MetricSample;
use crate::alerts::{AlertStore, AlertTransition};
use crate::thresholds::ThresholdRegistry;

pub struct Evaluator {
    thresholds: Arc<ThresholdRegistry>,
    alerts: Arc<AlertStore>,
}

impl Evaluator {
    pub fn new(thresholds: Arc<ThresholdRegistry>, alerts: Arc<AlertStore>) -> Self {
        Self { thresholds, alerts }
    }

    /// Evaluate one sample against every applicable enabled threshold.
    ///
    /// A threshold whose metric is absent from the sample is skipped;
    /// one unevaluable threshold never aborts the rest.
    #[instrument(skip_all, fields(server_id = %sample.server_id))]
    pub async fn evaluate(&self, sample: &MetricSample) -> Vec<AlertTransition> {
        let now = Utc::now();
        let mut transitions = Vec::new();

        for threshold in self.thresholds.applicable(&sample.server_id).await {
            let Some(value) = sample.metric_value(&threshold.metric) else {
                trace!(
                    "threshold {} skipped: metric '{}' absent from sample",
                    threshold.id, threshold.metric
                );
                continue;
            };

            let breached = threshold.comparator.holds(value, threshold.value);
            trace!(
                "threshold {}: {value} {} {} -> breached={breached}",
                threshold.id, threshold.comparator, threshold.value
            );

            if let Some(transition) = self
                .alerts
                .apply_breach(&threshold, &sample.server_id, value, breached, now)
                .await
            {
                transitions.push(transition);
            }
        }

        transitions
    }
}
