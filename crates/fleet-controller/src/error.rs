//! Controller error types.
//!
//! Every error here is scoped to one service and one tick. Configuration
//! errors live in `fleet_core::ConfigError` and never reach a worker.

use std::time::Duration;

use thiserror::Error;

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Failures reported by a capacity executor.
#[derive(Debug, Clone, Error)]
pub enum ExecutorError {
    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("allocation rejected: {0}")]
    Rejected(String),

    #[error("executor unreachable: {0}")]
    Unreachable(String),
}

/// Why a tick did not complete normally.
#[derive(Debug, Clone, Error)]
pub enum TickError {
    #[error("metrics unavailable for {service}: {reason}")]
    MetricUnavailable { service: String, reason: String },

    #[error("apply failed for {service}: {source}")]
    ApplyFailure {
        service: String,
        #[source]
        source: ExecutorError,
    },

    #[error("{operation} timed out for {service} after {timeout:?}")]
    Timeout {
        service: String,
        operation: &'static str,
        timeout: Duration,
    },

    #[error("could not read current units for {service}: {source}")]
    Resync {
        service: String,
        #[source]
        source: ExecutorError,
    },
}
