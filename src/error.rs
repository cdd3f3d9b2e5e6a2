//! Error types for the monitoring core

use std::fmt;

use crate::AlertStatus;

/// Result type alias for monitoring operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors produced by the stores, registry and engine
///
/// Every variant maps to a client-visible failure; none of them indicate an
/// internal fault. Write-path failures leave prior state unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorError {
    /// Sample rejected before it touched the series (stale timestamp,
    /// out-of-range field)
    InvalidSample(String),

    /// Query against a server no series exists for
    UnknownServer(String),

    /// Malformed input to a registry or store write
    Validation(String),

    /// Unknown threshold or alert id
    NotFound(String),

    /// Illegal alert status transition; state is unchanged
    InvalidTransition {
        from: AlertStatus,
        to: AlertStatus,
    },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::InvalidSample(msg) => write!(f, "invalid sample: {msg}"),
            MonitorError::UnknownServer(id) => write!(f, "unknown server: {id}"),
            MonitorError::Validation(msg) => write!(f, "validation failed: {msg}"),
            MonitorError::NotFound(what) => write!(f, "not found: {what}"),
            MonitorError::InvalidTransition { from, to } => {
                write!(f, "illegal alert transition {from} -> {to}")
            }
        }
    }
}

impl std::error::Error for MonitorError {}
