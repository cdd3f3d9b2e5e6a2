//! Consumer-side subscription with polling fallback
//!
//! Two interchangeable data sources sit behind one event stream:
//!
//! - a **push source** (long-lived WebSocket subscription), preferred
//!   whenever it can be established;
//! - a **pull source** (one-shot REST polls synthesized into the same
//!   events), used at fixed intervals while the push channel is down.
//!
//! The [`ReconnectionController`] owns the switchover: it connects, forwards
//! push events, falls back to polling on loss, and retries the push channel
//! with capped exponential backoff. On every successful (re)connect it runs
//! one pull sync first, so transitions that happened during the outage are
//! delivered exactly as a poll at that moment would have delivered them.

pub mod controller;
pub mod poll;
pub mod push;

pub use controller::{ControllerTiming, ReconnectionController};
pub use poll::{HttpPoller, PullSource};
pub use push::{PushSource, WsPushSource};
