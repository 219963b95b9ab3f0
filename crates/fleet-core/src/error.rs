//! Configuration error types.
//!
//! Every variant is fatal at startup: the controller never runs on a
//! document that failed to load.

use thiserror::Error;

use crate::cron::CronError;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config declares no services")]
    NoServices,

    #[error("service id must not be empty")]
    EmptyServiceId,

    #[error("duplicate service id: {0}")]
    DuplicateService(String),

    #[error("service {service}: invalid unit bounds min={min} max={max} (need 0 < min <= max)")]
    InvalidBounds { service: String, min: u32, max: u32 },

    #[error("service {service}: target {target} outside 1..=100")]
    InvalidTarget { service: String, target: f64 },

    #[error("service {0}: at least one threshold band is required")]
    NoBands(String),

    #[error("service {service}: band {index}: {reason}")]
    InvalidBand {
        service: String,
        index: usize,
        reason: String,
    },

    #[error("service {service}: scale-in cooldown {scale_in}s is shorter than scale-out cooldown {scale_out}s")]
    CooldownOrdering {
        service: String,
        scale_out: u64,
        scale_in: u64,
    },

    #[error("service {service}: evaluation_periods must be at least 1")]
    InvalidEvaluationPeriods { service: String },

    #[error("service {service}: scale_in_guard_points {value} must be between 0 and 100")]
    InvalidGuardBand { service: String, value: f64 },

    #[error("service {0}: non-critical services require a capacity_policy")]
    MissingCapacityPolicy(String),

    #[error("service {service}: invalid capacity policy: {reason}")]
    InvalidWeights { service: String, reason: String },

    #[error("override {name}: unknown service {service}")]
    UnknownService { name: String, service: String },

    #[error("override {name}: invalid bounds min={min} max={max} (need 0 < min <= max)")]
    InvalidOverrideBounds { name: String, min: u32, max: u32 },

    #[error("override {name}: needs a cron expression or a validity window")]
    EmptyOverride { name: String },

    #[error("override {name}: window must be between 1s and 7 days")]
    InvalidWindow { name: String },

    #[error("override {name}: valid_from must be before valid_until")]
    InvalidValidity { name: String },

    #[error("override {name}: {source}")]
    InvalidCron {
        name: String,
        #[source]
        source: CronError,
    },

    #[error("invalid timezone {0:?} (expected UTC or +HH:MM)")]
    InvalidTimezone(String),

    #[error("invalid timestamp {0:?} (expected RFC 3339)")]
    InvalidTimestamp(String),

    #[error("invalid duration {0:?} (expected e.g. 30s, 5m, 1h)")]
    InvalidDuration(String),
}
