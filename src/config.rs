use std::time::Duration;

use tracing::trace;

/// Retention bounds for every per-server series.
///
/// Both bounds apply; whichever is tighter wins.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct RetentionConfig {
    /// Maximum samples kept per server
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Maximum sample age in hours
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

impl RetentionConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours as i64)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

fn default_max_samples() -> usize {
    1000
}

fn default_max_age_hours() -> u64 {
    24
}

/// Fan-out delivery tuning.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct FanoutConfig {
    /// How long one delivery to one subscriber may take before the
    /// subscriber is dropped
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// Events buffered per subscriber
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl FanoutConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_ms: default_delivery_timeout_ms(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

fn default_delivery_timeout_ms() -> u64 {
    500
}

fn default_subscriber_buffer() -> usize {
    64
}

/// Consumer-side intervals for the polling fallback and reconnection.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct ConsumerConfig {
    /// Metrics poll interval while the push channel is down (seconds)
    #[serde(default = "default_metrics_poll_secs")]
    pub metrics_poll_secs: u64,

    /// Alerts poll interval while the push channel is down (seconds)
    #[serde(default = "default_alerts_poll_secs")]
    pub alerts_poll_secs: u64,

    /// First reconnect delay (milliseconds); doubles per attempt
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    /// Upper bound for the reconnect delay (seconds)
    #[serde(default = "default_reconnect_max_secs")]
    pub reconnect_max_secs: u64,
}

impl ConsumerConfig {
    pub fn metrics_poll_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_poll_secs)
    }

    pub fn alerts_poll_interval(&self) -> Duration {
        Duration::from_secs(self.alerts_poll_secs)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_secs(self.reconnect_max_secs)
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            metrics_poll_secs: default_metrics_poll_secs(),
            alerts_poll_secs: default_alerts_poll_secs(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_secs: default_reconnect_max_secs(),
        }
    }
}

fn default_metrics_poll_secs() -> u64 {
    5
}

fn default_alerts_poll_secs() -> u64 {
    15
}

fn default_reconnect_initial_ms() -> u64 {
    500
}

fn default_reconnect_max_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub retention: RetentionConfig,

    #[serde(default)]
    pub fanout: FanoutConfig,

    #[serde(default)]
    pub consumer: ConsumerConfig,
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
