//! Single-server sample ring buffer

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

use crate::MetricSample;
use crate::error::{MonitorError, MonitorResult};

/// Ordered history of samples for one server.
///
/// Invariant: timestamps are strictly increasing front to back, so the deque
/// is always sorted and duplicate timestamps cannot occur.
#[derive(Debug)]
pub struct SeriesBuffer {
    samples: VecDeque<MetricSample>,
    max_samples: usize,
    max_age: Duration,
}

/// Field-level checks that do not need the series state.
///
/// Shared with the store so a malformed sample is rejected before a
/// partition is ever created for its server.
pub(crate) fn validate_fields(sample: &MetricSample) -> MonitorResult<()> {
    for (field, value) in [
        ("cpu_usage", sample.cpu_usage),
        ("memory_usage", sample.memory_usage),
        ("disk_usage", sample.disk_usage),
    ] {
        if !value.is_finite() {
            return Err(MonitorError::InvalidSample(format!(
                "{field} is not a finite number"
            )));
        }
        if !(0.0..=100.0).contains(&value) {
            return Err(MonitorError::InvalidSample(format!(
                "{field} {value} outside 0..=100"
            )));
        }
    }

    for (name, value) in &sample.custom {
        if !value.is_finite() {
            return Err(MonitorError::InvalidSample(format!(
                "custom counter '{name}' is not a finite number"
            )));
        }
    }

    Ok(())
}

impl SeriesBuffer {
    pub fn new(max_samples: usize, max_age: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples.min(1024)),
            max_samples,
            max_age,
        }
    }

    /// Append a sample, evicting the oldest entries past either bound.
    ///
    /// Fails without touching the buffer if the timestamp is not strictly
    /// newer than the current latest sample or a field is out of range.
    pub fn append(&mut self, sample: MetricSample, now: DateTime<Utc>) -> MonitorResult<()> {
        validate_fields(&sample)?;

        if let Some(latest) = self.samples.back()
            && sample.timestamp <= latest.timestamp
        {
            return Err(MonitorError::InvalidSample(format!(
                "timestamp {} is not newer than latest {}",
                sample.timestamp, latest.timestamp
            )));
        }

        self.samples.push_back(sample);

        // Count bound, then age bound. Eviction runs on the write path only;
        // stale entries surviving between appends are filtered by queries.
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
        let cutoff = now - self.max_age;
        while self
            .samples
            .front()
            .is_some_and(|oldest| oldest.timestamp < cutoff)
        {
            self.samples.pop_front();
        }

        Ok(())
    }

    /// Samples within `[start, end]` inclusive, ascending by timestamp.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MetricSample> {
        self.samples
            .iter()
            .filter(|s| s.timestamp >= start && s.timestamp <= end)
            .cloned()
            .collect()
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
