//! Event types flowing from the engine to subscribers
//!
//! All events are cloneable for multi-subscriber fan-out. The serde
//! representation is the wire format of the push stream, and the poller
//! synthesizes the very same events from REST snapshots so the push and pull
//! views stay interchangeable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MetricSample;
use crate::alerts::Alert;
use crate::error::MonitorError;

/// Event published on every accepted sample and alert transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    NewMetrics {
        server_id: String,
        sample: MetricSample,
    },
    AlertCreated {
        alert: Alert,
    },
    AlertUpdated {
        alert: Alert,
    },
    AlertResolved {
        alert: Alert,
    },
}

impl MonitorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            MonitorEvent::NewMetrics { .. } => EventKind::Metrics,
            _ => EventKind::Alerts,
        }
    }

    /// Server the event concerns, for subscription filtering.
    pub fn server_id(&self) -> &str {
        match self {
            MonitorEvent::NewMetrics { server_id, .. } => server_id,
            MonitorEvent::AlertCreated { alert }
            | MonitorEvent::AlertUpdated { alert }
            | MonitorEvent::AlertResolved { alert } => &alert.server_id,
        }
    }
}

/// Categories a subscription can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Metrics,
    Alerts,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Metrics => write!(f, "metrics"),
            EventKind::Alerts => write!(f, "alerts"),
        }
    }
}

impl FromStr for EventKind {
    type Err = MonitorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metrics" => Ok(EventKind::Metrics),
            "alerts" => Ok(EventKind::Alerts),
            other => Err(MonitorError::Validation(format!(
                "unrecognized event kind '{other}'"
            ))),
        }
    }
}

/// What one subscription wants to receive.
#[derive(Debug, Clone)]
pub struct SubscriptionFilter {
    pub metrics: bool,
    pub alerts: bool,
    /// Restrict to one server; `None` receives every server.
    pub server_id: Option<String>,
}

impl Default for SubscriptionFilter {
    fn default() -> Self {
        Self {
            metrics: true,
            alerts: true,
            server_id: None,
        }
    }
}

impl SubscriptionFilter {
    /// Parse a comma-separated kinds list (`"metrics,alerts"`).
    pub fn from_kinds(kinds: &str, server_id: Option<String>) -> Result<Self, MonitorError> {
        let mut filter = Self {
            metrics: false,
            alerts: false,
            server_id,
        };
        for kind in kinds.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            match kind.parse::<EventKind>()? {
                EventKind::Metrics => filter.metrics = true,
                EventKind::Alerts => filter.alerts = true,
            }
        }
        if !filter.metrics && !filter.alerts {
            return Err(MonitorError::Validation(
                "subscription requests no event kinds".to_string(),
            ));
        }
        Ok(filter)
    }

    pub fn matches(&self, event: &MonitorEvent) -> bool {
        let kind_ok = match event.kind() {
            EventKind::Metrics => self.metrics,
            EventKind::Alerts => self.alerts,
        };
        let server_ok = self
            .server_id
            .as_deref()
            .is_none_or(|id| event.server_id() == id);
        kind_ok && server_ok
    }
}

/// Publish capability injected into the engine.
///
/// `publish` must only enqueue: the ingest path calls it synchronously and
/// must never wait on delivery to any subscriber.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: MonitorEvent);
}

/// Publisher that drops every event; for tests and headless setups.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: MonitorEvent) {}
}
