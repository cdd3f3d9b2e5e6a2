//! REST API and WebSocket server for the monitoring engine
//!
//! This is the surface the dashboard and other collaborators consume: metric
//! range queries, threshold CRUD, alert reads and status transitions, plus a
//! WebSocket stream carrying the same events the fan-out hub publishes.
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **Engine handle** for every store access (no globals)
//! - **WebSocket** endpoint bridging fan-out subscriptions to sockets
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check and engine counters
//! - `GET /api/v1/servers` - Known series
//! - `GET /api/v1/metrics` - Time-series range query
//! - `GET|POST /api/v1/thresholds`, `GET|PATCH|DELETE /api/v1/thresholds/:id`
//! - `GET /api/v1/alerts`, `GET|PATCH /api/v1/alerts/:id`
//! - `WS /api/v1/stream` - Real-time event stream

pub mod error;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{get, patch},
};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for dashboard
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: (crate::util::get_addr(), crate::util::get_port()).into(),
            enable_cors: true,
        }
    }
}

/// Spawn the API server in a background task.
///
/// Returns the server's local address (useful with a port-0 bind in tests).
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    info!("starting API server on {}", config.bind_addr);

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/servers", get(routes::metrics::list_servers))
        .route("/api/v1/metrics", get(routes::metrics::get_metrics))
        .route(
            "/api/v1/thresholds",
            get(routes::thresholds::list_thresholds).post(routes::thresholds::create_threshold),
        )
        .route(
            "/api/v1/thresholds/:id",
            get(routes::thresholds::get_threshold)
                .patch(routes::thresholds::update_threshold)
                .delete(routes::thresholds::delete_threshold),
        )
        .route("/api/v1/alerts", get(routes::alerts::list_alerts))
        .route(
            "/api/v1/alerts/:id",
            patch(routes::alerts::update_alert_status).get(routes::alerts::get_alert),
        )
        .route("/api/v1/stream", get(websocket::websocket_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
