//! WebSocket push source

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace};

use crate::events::{MonitorEvent, SubscriptionFilter};

/// A long-lived push subscription attempt.
///
/// `connect` either fails (the controller backs off and retries) or yields a
/// stream of events that ends when the connection is lost.
#[async_trait]
pub trait PushSource: Send + Sync {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<MonitorEvent>>;
}

/// WebSocket client for streaming events from the hub
pub struct WsPushSource {
    url: String,
}

impl WsPushSource {
    /// `api_url` is the hub's HTTP base (e.g. `http://127.0.0.1:8080`).
    pub fn new(api_url: &str, filter: &SubscriptionFilter) -> Self {
        // Convert http:// to ws:// and https:// to wss://
        let ws_url = api_url
            .replace("http://", "ws://")
            .replace("https://", "wss://");

        let mut kinds = Vec::new();
        if filter.metrics {
            kinds.push("metrics");
        }
        if filter.alerts {
            kinds.push("alerts");
        }
        let mut url = format!("{}/api/v1/stream?kinds={}", ws_url, kinds.join(","));
        if let Some(server_id) = &filter.server_id {
            url.push_str(&format!("&server_id={server_id}"));
        }

        Self { url }
    }
}

#[async_trait]
impl PushSource for WsPushSource {
    async fn connect(&self) -> Result<mpsc::UnboundedReceiver<MonitorEvent>> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .with_context(|| format!("failed to connect to WebSocket at {}", self.url))?;

        info!("WebSocket connected");

        let (tx, rx) = mpsc::unbounded_channel();
        let (mut write, mut read) = ws_stream.split();

        // Keep the connection alive with periodic pings.
        let ping_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
                if write.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!("WebSocket message error: {e}");
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str::<MonitorEvent>(&text) {
                        Ok(event) => {
                            if tx.send(event).is_err() {
                                // Receiver dropped, exit
                                break;
                            }
                        }
                        Err(e) => {
                            debug!("failed to parse event: {e}\nraw JSON: {text}");
                        }
                    },
                    Message::Close(_) => {
                        info!("WebSocket closed by server");
                        break;
                    }
                    Message::Pong(_) => {
                        trace!("pong");
                    }
                    _ => {}
                }
            }

            ping_task.abort();
            // tx drops here; the controller sees the stream end.
        });

        Ok(rx)
    }
}
