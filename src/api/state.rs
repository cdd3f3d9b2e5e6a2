//! API shared state

use std::sync::Arc;

use crate::engine::MonitorEngine;
use crate::fanout::FanOutHub;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Engine handle for store reads and guarded writes
    pub engine: Arc<MonitorEngine>,

    /// Fan-out hub for WebSocket subscriptions
    pub fanout: Arc<FanOutHub>,
}

impl ApiState {
    pub fn new(engine: Arc<MonitorEngine>, fanout: Arc<FanOutHub>) -> Self {
        Self { engine, fanout }
    }
}
