//! Real-time fan-out hub
//!
//! One broadcast channel carries every event; each subscription gets its own
//! forwarding task that filters the stream and pushes matching events into
//! the subscriber's bounded channel. Delivery is best-effort and
//! at-most-once: there is no replay buffer, and a subscriber that cannot
//! keep up is dropped (polling is the recovery path, not a message queue).
//!
//! A stuck subscriber only ever costs its own forwarding task; the ingest
//! path and every other subscription keep flowing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::events::{EventPublisher, MonitorEvent, SubscriptionFilter};

/// Events buffered in the shared broadcast channel before slow readers lag.
const BROADCAST_CAPACITY: usize = 256;

/// A live subscription handed to a consumer.
///
/// Dropping it (or just the receiver) tears the forwarding task down and
/// deregisters the subscription.
pub struct Subscription {
    pub id: u64,
    pub events: mpsc::Receiver<MonitorEvent>,
}

struct SubscriberEntry {
    forwarder: JoinHandle<()>,
}

/// Registry of live subscriptions plus the shared event channel.
pub struct FanOutHub {
    events_tx: broadcast::Sender<MonitorEvent>,
    delivery_timeout: Duration,
    subscriber_buffer: usize,
    next_id: AtomicU64,
    subscribers: Arc<Mutex<HashMap<u64, SubscriberEntry>>>,
}

impl FanOutHub {
    pub fn new(delivery_timeout: Duration, subscriber_buffer: usize) -> Self {
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            events_tx,
            delivery_timeout,
            subscriber_buffer,
            next_id: AtomicU64::new(1),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The publish capability to inject into the engine.
    pub fn publisher(&self) -> BroadcastPublisher {
        BroadcastPublisher {
            tx: self.events_tx.clone(),
        }
    }

    /// Register a subscription and spawn its forwarding task.
    pub async fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.subscriber_buffer);
        let mut source = self.events_tx.subscribe();
        let delivery_timeout = self.delivery_timeout;
        let registry = self.subscribers.clone();

        let forwarder = tokio::spawn(async move {
            loop {
                match source.recv().await {
                    Ok(event) => {
                        if !filter.matches(&event) {
                            continue;
                        }
                        match timeout(delivery_timeout, tx.send(event)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(_)) => {
                                debug!("subscriber {id} went away");
                                break;
                            }
                            Err(_) => {
                                warn!(
                                    "subscriber {id} exceeded the {delivery_timeout:?} delivery \
                                     timeout, dropping it"
                                );
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // A lagging subscriber has already missed events; by
                        // the at-most-once contract it is dropped rather than
                        // fed a gap-filled stream.
                        warn!("subscriber {id} lagged by {skipped} events, dropping it");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            registry.lock().await.remove(&id);
        });

        self.subscribers
            .lock()
            .await
            .insert(id, SubscriberEntry { forwarder });
        debug!("subscription {id} registered");

        Subscription { id, events: rx }
    }

    /// Drop a subscription explicitly (consumers usually just drop it).
    pub async fn unsubscribe(&self, id: u64) {
        if let Some(entry) = self.subscribers.lock().await.remove(&id) {
            entry.forwarder.abort();
            debug!("subscription {id} removed");
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }
}

/// Broadcast-backed implementation of the publish capability.
///
/// `send` only enqueues into the broadcast buffer; a send with no live
/// receivers is not an error.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<MonitorEvent>,
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: MonitorEvent) {
        let _ = self.tx.send(event);
    }
}
