//! WebSocket handler for real-time event streaming

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::events::SubscriptionFilter;

/// Stream subscription parameters
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Comma-separated event kinds (`metrics`, `alerts`); default both
    kinds: Option<String>,

    /// Restrict the stream to one server
    server_id: Option<String>,
}

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<ApiState>,
) -> ApiResult<Response> {
    let filter = match query.kinds {
        Some(kinds) => SubscriptionFilter::from_kinds(&kinds, query.server_id)
            .map_err(ApiError::from)?,
        None => SubscriptionFilter {
            server_id: query.server_id,
            ..SubscriptionFilter::default()
        },
    };

    Ok(ws.on_upgrade(move |socket| handle_websocket(socket, state, filter)))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: ApiState, filter: SubscriptionFilter) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();

    let subscription = state.fanout.subscribe(filter).await;
    let subscription_id = subscription.id;
    let mut events = subscription.events;

    // Forward fan-out events to the socket. When the hub drops us (timeout
    // or lag) the channel closes and the socket is torn down; the client is
    // expected to resubscribe and resync via a poll.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    debug!("failed to serialize event: {e}");
                }
            }
        }
    });

    // Handle incoming messages; clients only ever ping or close.
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Close(_) => break,
                Message::Ping(_) => {
                    // Pong is automatically sent by axum
                    debug!("received ping");
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    state.fanout.unsubscribe(subscription_id).await;
    info!("WebSocket client disconnected");
}
