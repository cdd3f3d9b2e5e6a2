pub mod alerts;
#[cfg(feature = "api")]
pub mod api;
#[cfg(feature = "client")]
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod fanout;
pub mod store;
pub mod thresholds;
pub mod util;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MonitorError;

/// One timestamped metric reading for a server.
///
/// Samples are immutable once appended to a series. Bounded usage fields are
/// percentages in `0.0..=100.0`; network counters are bytes per interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub server_id: String,
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub disk_usage: f64,
    pub network_in: u64,
    pub network_out: u64,
    /// Additional named counters (player counts, tick times, ...).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom: HashMap<String, f64>,
}

impl MetricSample {
    /// Value of the given metric in this sample, if present.
    ///
    /// Network thresholds compare against total throughput (in + out).
    pub fn metric_value(&self, kind: &MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Cpu => Some(self.cpu_usage),
            MetricKind::Memory => Some(self.memory_usage),
            MetricKind::Disk => Some(self.disk_usage),
            MetricKind::Network => Some((self.network_in + self.network_out) as f64),
            MetricKind::Custom(name) => self.custom.get(name).copied(),
        }
    }
}

/// Kind of metric a threshold applies to.
///
/// Any identifier other than the four built-in kinds names a custom counter
/// in [`MetricSample::custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Cpu,
    Memory,
    Disk,
    Network,
    Custom(String),
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Cpu => write!(f, "cpu"),
            MetricKind::Memory => write!(f, "memory"),
            MetricKind::Disk => write!(f, "disk"),
            MetricKind::Network => write!(f, "network"),
            MetricKind::Custom(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "cpu" => MetricKind::Cpu,
            "memory" => MetricKind::Memory,
            "disk" => MetricKind::Disk,
            "network" => MetricKind::Network,
            other => MetricKind::Custom(other.to_string()),
        })
    }
}

impl Serialize for MetricKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MetricKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().expect("metric kind parsing is infallible"))
    }
}

/// Comparison operator of a threshold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    /// Whether `value <op> limit` holds.
    pub fn holds(&self, value: f64, limit: f64) -> bool {
        match self {
            Comparator::Gt => value > limit,
            Comparator::Gte => value >= limit,
            Comparator::Lt => value < limit,
            Comparator::Lte => value <= limit,
            Comparator::Eq => value == limit,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Comparator::Gt => ">",
            Comparator::Gte => ">=",
            Comparator::Lt => "<",
            Comparator::Lte => "<=",
            Comparator::Eq => "==",
        };
        write!(f, "{op}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "critical" => Ok(Severity::Critical),
            other => Err(MonitorError::Validation(format!(
                "unrecognized severity '{other}'"
            ))),
        }
    }
}

/// Lifecycle state of an alert.
///
/// `active` and `acknowledged` are the *open* states; `resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, AlertStatus::Active | AlertStatus::Acknowledged)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl FromStr for AlertStatus {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(MonitorError::Validation(format!(
                "unrecognized alert status '{other}'"
            ))),
        }
    }
}

/// Which servers a threshold applies to: one server, or all of them (`"*"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdScope {
    All,
    Server(String),
}

impl ThresholdScope {
    pub fn matches(&self, server_id: &str) -> bool {
        match self {
            ThresholdScope::All => true,
            ThresholdScope::Server(id) => id == server_id,
        }
    }
}

impl fmt::Display for ThresholdScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdScope::All => write!(f, "*"),
            ThresholdScope::Server(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for ThresholdScope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "*" => ThresholdScope::All,
            id => ThresholdScope::Server(id.to_string()),
        })
    }
}

impl Serialize for ThresholdScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ThresholdScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().expect("scope parsing is infallible"))
    }
}

/// Relative query window, resolved against wall-clock now at query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    LastHour,
    LastDay,
    LastWeek,
    LastMonth,
}

impl TimeRange {
    pub fn duration(&self) -> Duration {
        match self {
            TimeRange::LastHour => Duration::hours(1),
            TimeRange::LastDay => Duration::hours(24),
            TimeRange::LastWeek => Duration::days(7),
            TimeRange::LastMonth => Duration::days(30),
        }
    }

    /// `[now - duration, now]` window.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - self.duration(), now)
    }
}

impl FromStr for TimeRange {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(TimeRange::LastHour),
            "24h" => Ok(TimeRange::LastDay),
            "7d" => Ok(TimeRange::LastWeek),
            "30d" => Ok(TimeRange::LastMonth),
            other => Err(MonitorError::Validation(format!(
                "unrecognized time range '{other}' (expected 1h, 24h, 7d or 30d)"
            ))),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeRange::LastHour => write!(f, "1h"),
            TimeRange::LastDay => write!(f, "24h"),
            TimeRange::LastWeek => write!(f, "7d"),
            TimeRange::LastMonth => write!(f, "30d"),
        }
    }
}
