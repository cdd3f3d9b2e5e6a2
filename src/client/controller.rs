//! Push-preferred consumer with polling fallback

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tracing::{debug, info, instrument, warn};

use crate::config::ConsumerConfig;
use crate::events::MonitorEvent;

use super::poll::PullSource;
use super::push::PushSource;

/// Intervals and backoff bounds for the controller.
///
/// Kept separate from [`ConsumerConfig`] so tests can run with millisecond
/// timings.
#[derive(Debug, Clone, Copy)]
pub struct ControllerTiming {
    pub metrics_poll: Duration,
    pub alerts_poll: Duration,
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl From<ConsumerConfig> for ControllerTiming {
    fn from(config: ConsumerConfig) -> Self {
        Self {
            metrics_poll: config.metrics_poll_interval(),
            alerts_poll: config.alerts_poll_interval(),
            reconnect_initial: config.reconnect_initial(),
            reconnect_max: config.reconnect_max(),
        }
    }
}

/// Consumer loop preferring push delivery, polling while it is down.
///
/// While connected, push is the sole source. On loss the controller polls at
/// fixed intervals (metrics short, alerts longer) and retries the push
/// channel with exponential backoff capped at `reconnect_max`. Each
/// successful (re)connect starts with one pull sync so transitions from the
/// outage window are not lost.
pub struct ReconnectionController<P, S> {
    push: P,
    pull: S,
    timing: ControllerTiming,
}

impl<P, S> ReconnectionController<P, S>
where
    P: PushSource + 'static,
    S: PullSource + 'static,
{
    pub fn new(push: P, pull: S, timing: ControllerTiming) -> Self {
        Self { push, pull, timing }
    }

    /// Spawn the controller; events arrive on the returned channel.
    ///
    /// Dropping the receiver tears the controller down on its next send.
    pub fn spawn(self) -> mpsc::UnboundedReceiver<MonitorEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(self.run(tx));
        rx
    }

    #[instrument(skip_all)]
    async fn run(mut self, tx: mpsc::UnboundedSender<MonitorEvent>) {
        let mut backoff = self.timing.reconnect_initial;

        loop {
            match self.push.connect().await {
                Ok(mut stream) => {
                    info!("push channel established");
                    backoff = self.timing.reconnect_initial;

                    // Resync before trusting the stream: anything that
                    // happened while we were away is delivered exactly as a
                    // poll at this moment would deliver it.
                    if !self.forward_sync(&tx).await {
                        return;
                    }

                    while let Some(event) = stream.recv().await {
                        if tx.send(event).is_err() {
                            debug!("consumer dropped, stopping");
                            return;
                        }
                    }

                    warn!("push channel lost, falling back to polling");
                }
                Err(e) => {
                    warn!("push connect failed: {e}, polling until next attempt");
                }
            }

            // Polling fallback until the backoff window elapses.
            if !self.poll_for(backoff, &tx).await {
                return;
            }

            backoff = (backoff * 2).min(self.timing.reconnect_max);
        }
    }

    /// One full pull sync (alerts first, then metrics). Returns false when
    /// the consumer is gone.
    async fn forward_sync(&mut self, tx: &mpsc::UnboundedSender<MonitorEvent>) -> bool {
        for result in [
            self.pull.poll_alerts().await,
            self.pull.poll_metrics().await,
        ] {
            match result {
                Ok(events) => {
                    for event in events {
                        if tx.send(event).is_err() {
                            return false;
                        }
                    }
                }
                Err(e) => warn!("pull sync failed: {e}"),
            }
        }
        true
    }

    /// Poll at the configured intervals for `window`, then return for the
    /// next reconnect attempt. Returns false when the consumer is gone.
    async fn poll_for(&mut self, window: Duration, tx: &mpsc::UnboundedSender<MonitorEvent>) -> bool {
        let mut metrics_tick = interval(self.timing.metrics_poll);
        let mut alerts_tick = interval(self.timing.alerts_poll);
        let deadline = sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => return true,

                _ = metrics_tick.tick() => {
                    match self.pull.poll_metrics().await {
                        Ok(events) => {
                            for event in events {
                                if tx.send(event).is_err() {
                                    return false;
                                }
                            }
                        }
                        Err(e) => warn!("metrics poll failed: {e}"),
                    }
                }

                _ = alerts_tick.tick() => {
                    match self.pull.poll_alerts().await {
                        Ok(events) => {
                            for event in events {
                                if tx.send(event).is_err() {
                                    return false;
                                }
                            }
                        }
                        Err(e) => warn!("alerts poll failed: {e}"),
                    }
                }
            }
        }
    }
}
