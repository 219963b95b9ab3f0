//! fleet-core — shared types and configuration for the fleet autoscaler.
//!
//! Everything here is plain data: the managed-service table, threshold
//! bands, scheduled overrides, metric samples, and the allocation the
//! controller produces. `FleetConfig` loads and validates the TOML
//! document the daemon starts from; an invalid document never produces
//! a config value.

pub mod config;
pub mod cron;
pub mod error;
pub mod time;
pub mod types;

pub use config::{ControllerSettings, FleetConfig};
pub use cron::{CronError, CronExpr};
pub use error::{ConfigError, ConfigResult};
pub use types::*;
