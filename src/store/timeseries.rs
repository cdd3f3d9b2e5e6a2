//! Per-server partitioned time-series store

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::error::{MonitorError, MonitorResult};
use crate::store::series::{SeriesBuffer, validate_fields};
use crate::{MetricSample, TimeRange};

/// Summary of one tracked series, for dashboard listings.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSeriesInfo {
    pub server_id: String,
    pub samples: usize,
    pub latest: Option<DateTime<Utc>>,
}

/// Owner of all metric history.
///
/// A partition is created lazily on the first valid sample for a server;
/// queries against a server without a partition fail with `UnknownServer`,
/// which is distinct from an existing-but-empty series.
pub struct TimeSeriesStore {
    max_samples: usize,
    max_age: chrono::Duration,
    partitions: RwLock<HashMap<String, Arc<RwLock<SeriesBuffer>>>>,
}

impl TimeSeriesStore {
    pub fn new(max_samples: usize, max_age: chrono::Duration) -> Self {
        Self {
            max_samples,
            max_age,
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Append a sample to its server's series.
    ///
    /// Field validation runs before the partition is looked up, so a
    /// malformed sample never creates a series for an unknown server.
    pub async fn append(&self, sample: MetricSample) -> MonitorResult<()> {
        validate_fields(&sample)?;

        let partition = self.partition_or_create(&sample.server_id).await;
        let mut series = partition.write().await;
        series.append(sample, Utc::now())?;
        trace!("series now holds {} samples", series.len());
        Ok(())
    }

    /// Samples within `[start, end]`, ascending by timestamp.
    pub async fn query(
        &self,
        server_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MonitorResult<Vec<MetricSample>> {
        let partition = self.partition(server_id).await?;
        let series = partition.read().await;
        Ok(series.range(start, end))
    }

    /// Relative window query; the window is anchored at wall-clock now.
    pub async fn query_window(
        &self,
        server_id: &str,
        range: TimeRange,
    ) -> MonitorResult<Vec<MetricSample>> {
        let (start, end) = range.window(Utc::now());
        self.query(server_id, start, end).await
    }

    /// Most recent sample for a server, if any.
    pub async fn latest(&self, server_id: &str) -> MonitorResult<Option<MetricSample>> {
        let partition = self.partition(server_id).await?;
        let series = partition.read().await;
        Ok(series.latest().cloned())
    }

    /// All tracked servers with their series sizes, sorted by id.
    pub async fn servers(&self) -> Vec<ServerSeriesInfo> {
        let partitions = self.partitions.read().await;
        let mut infos = Vec::with_capacity(partitions.len());
        for (server_id, partition) in partitions.iter() {
            let series = partition.read().await;
            infos.push(ServerSeriesInfo {
                server_id: server_id.clone(),
                samples: series.len(),
                latest: series.latest().map(|s| s.timestamp),
            });
        }
        infos.sort_by(|a, b| a.server_id.cmp(&b.server_id));
        infos
    }

    pub async fn server_count(&self) -> usize {
        self.partitions.read().await.len()
    }

    async fn partition(&self, server_id: &str) -> MonitorResult<Arc<RwLock<SeriesBuffer>>> {
        let partitions = self.partitions.read().await;
        partitions
            .get(server_id)
            .cloned()
            .ok_or_else(|| MonitorError::UnknownServer(server_id.to_string()))
    }

    async fn partition_or_create(&self, server_id: &str) -> Arc<RwLock<SeriesBuffer>> {
        {
            let partitions = self.partitions.read().await;
            if let Some(partition) = partitions.get(server_id) {
                return partition.clone();
            }
        }

        let mut partitions = self.partitions.write().await;
        partitions
            .entry(server_id.to_string())
            .or_insert_with(|| {
                debug!("creating series partition for {server_id}");
                Arc::new(RwLock::new(SeriesBuffer::new(self.max_samples, self.max_age)))
            })
            .clone()
    }
}
