//! Bounded in-memory time-series storage
//!
//! Per-server history lives in a ring buffer capped by BOTH a sample count
//! and a wall-clock retention window; whichever bound is tighter wins.
//! Nothing here persists across restarts - durable storage is out of scope
//! for this engine.
//!
//! ## Locking
//!
//! Partitions are per-server: an outer map lock hands out `Arc` partition
//! handles, and each partition has its own `RwLock`. Appends for one server
//! serialize on that server's lock; queries and appends for unrelated
//! servers never contend.

mod series;
mod timeseries;

pub use series::SeriesBuffer;
pub use timeseries::{ServerSeriesInfo, TimeSeriesStore};
