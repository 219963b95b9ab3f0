//! fleet.toml configuration parser.
//!
//! The document is deserialized into raw, string-typed structs and then
//! validated into `ManagedService` / `ScheduledOverride` values. Any
//! validation failure aborts the load.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cron::CronExpr;
use crate::error::{ConfigError, ConfigResult};
use crate::time::{parse_duration, parse_timestamp, parse_timezone};
use crate::types::*;

const DEFAULT_TICK_INTERVAL: &str = "30s";
const DEFAULT_FETCH_TIMEOUT: &str = "5s";
const DEFAULT_APPLY_TIMEOUT: &str = "10s";
const DEFAULT_SAMPLE_MAX_AGE: &str = "5m";
const DEFAULT_EVALUATION_PERIODS: usize = 2;
const DEFAULT_SCALE_IN_GUARD_POINTS: f64 = 20.0;
const WEIGHT_EPSILON: f64 = 1e-6;
const MAX_OVERRIDE_WINDOW: Duration = Duration::from_secs(7 * 24 * 3600);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub controller: Option<RawControllerConfig>,
    #[serde(default)]
    pub services: Vec<RawServiceConfig>,
    #[serde(default)]
    pub overrides: Vec<RawOverrideConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawControllerConfig {
    pub tick_interval: Option<String>,
    pub fetch_timeout: Option<String>,
    pub apply_timeout: Option<String>,
    pub sample_max_age: Option<String>,
    pub evaluation_periods: Option<usize>,
    pub scale_in_guard_points: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawServiceConfig {
    pub id: String,
    #[serde(default)]
    pub critical: bool,
    pub min_units: u32,
    pub max_units: u32,
    #[serde(default = "default_metric")]
    pub metric: MetricKind,
    pub target: f64,
    pub bands: Vec<ThresholdBand>,
    pub scale_out_cooldown: String,
    pub scale_in_cooldown: String,
    pub evaluation_periods: Option<usize>,
    pub scale_in_guard_points: Option<f64>,
    pub capacity_policy: Option<CapacityClassPolicy>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOverrideConfig {
    pub service: String,
    pub name: Option<String>,
    pub cron: Option<String>,
    pub window: Option<String>,
    pub timezone: Option<String>,
    pub min_units: u32,
    pub max_units: u32,
    pub valid_from: Option<String>,
    pub valid_until: Option<String>,
    #[serde(default)]
    pub bypass_cooldown: bool,
}

fn default_metric() -> MetricKind {
    MetricKind::Cpu
}

/// Controller-wide loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub tick_interval: Duration,
    pub fetch_timeout: Duration,
    pub apply_timeout: Duration,
    /// Samples older than this count as missing data.
    pub sample_max_age: Duration,
    pub evaluation_periods: usize,
    pub scale_in_guard_points: f64,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(5),
            apply_timeout: Duration::from_secs(10),
            sample_max_age: Duration::from_secs(300),
            evaluation_periods: DEFAULT_EVALUATION_PERIODS,
            scale_in_guard_points: DEFAULT_SCALE_IN_GUARD_POINTS,
        }
    }
}

/// A validated fleet configuration. Read-only once loaded.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub controller: ControllerSettings,
    pub services: Vec<ManagedService>,
    /// All overrides in declaration order.
    pub overrides: Vec<ScheduledOverride>,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            services = config.services.len(),
            overrides = config.overrides.len(),
            "fleet config loaded"
        );
        config.log_precedence();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        raw.validate()
    }

    pub fn service(&self, id: &str) -> Option<&ManagedService> {
        self.services.iter().find(|s| s.id == id)
    }

    /// Overrides for one service, highest precedence first: explicit
    /// windows before recurring ones, later declarations before earlier.
    pub fn precedence(&self, service_id: &str) -> Vec<&ScheduledOverride> {
        let mut ordered: Vec<&ScheduledOverride> = self
            .overrides
            .iter()
            .filter(|o| o.service_id == service_id)
            .collect();
        ordered.sort_by(|a, b| {
            b.is_explicit()
                .cmp(&a.is_explicit())
                .then(b.order.cmp(&a.order))
        });
        ordered
    }

    /// One line per service describing how its overrides resolve.
    pub fn precedence_summary(&self) -> Vec<String> {
        self.services
            .iter()
            .filter_map(|svc| {
                let ordered = self.precedence(&svc.id);
                if ordered.is_empty() {
                    return None;
                }
                let names: Vec<String> = ordered
                    .iter()
                    .map(|o| {
                        let kind = if o.is_explicit() { "explicit" } else { "recurring" };
                        format!("{} ({kind}, {})", o.name, o.bounds)
                    })
                    .collect();
                Some(format!("{}: {}", svc.id, names.join(" > ")))
            })
            .collect()
    }

    fn log_precedence(&self) {
        for line in self.precedence_summary() {
            info!(precedence = %line, "override precedence");
        }
    }
}

impl RawConfig {
    pub fn validate(self) -> ConfigResult<FleetConfig> {
        let controller = self.controller.unwrap_or_default().validate()?;

        if self.services.is_empty() {
            return Err(ConfigError::NoServices);
        }

        let mut seen = HashSet::new();
        let mut services = Vec::with_capacity(self.services.len());
        for raw in self.services {
            let svc = raw.validate(&controller)?;
            if !seen.insert(svc.id.clone()) {
                return Err(ConfigError::DuplicateService(svc.id));
            }
            services.push(svc);
        }

        let mut overrides = Vec::with_capacity(self.overrides.len());
        for (order, raw) in self.overrides.into_iter().enumerate() {
            let svc = services.iter().find(|s| s.id == raw.service).ok_or_else(|| {
                ConfigError::UnknownService {
                    name: raw.display_name(order),
                    service: raw.service.clone(),
                }
            })?;
            overrides.push(raw.validate(order, svc.timezone)?);
        }

        Ok(FleetConfig {
            controller,
            services,
            overrides,
        })
    }
}

impl RawControllerConfig {
    fn validate(self) -> ConfigResult<ControllerSettings> {
        let evaluation_periods = self
            .evaluation_periods
            .unwrap_or(DEFAULT_EVALUATION_PERIODS);
        if evaluation_periods == 0 {
            return Err(ConfigError::InvalidEvaluationPeriods {
                service: "<controller>".to_string(),
            });
        }
        let scale_in_guard_points = self
            .scale_in_guard_points
            .unwrap_or(DEFAULT_SCALE_IN_GUARD_POINTS);
        check_guard_band("<controller>", scale_in_guard_points)?;

        Ok(ControllerSettings {
            tick_interval: parse_nonzero_duration(
                self.tick_interval.as_deref().unwrap_or(DEFAULT_TICK_INTERVAL),
            )?,
            fetch_timeout: parse_nonzero_duration(
                self.fetch_timeout.as_deref().unwrap_or(DEFAULT_FETCH_TIMEOUT),
            )?,
            apply_timeout: parse_nonzero_duration(
                self.apply_timeout.as_deref().unwrap_or(DEFAULT_APPLY_TIMEOUT),
            )?,
            sample_max_age: parse_nonzero_duration(
                self.sample_max_age.as_deref().unwrap_or(DEFAULT_SAMPLE_MAX_AGE),
            )?,
            evaluation_periods,
            scale_in_guard_points,
        })
    }
}

/// Loop timings must be non-zero.
fn parse_nonzero_duration(s: &str) -> ConfigResult<Duration> {
    let d = parse_duration(s)?;
    if d.is_zero() {
        return Err(ConfigError::InvalidDuration(s.trim().to_string()));
    }
    Ok(d)
}

impl RawServiceConfig {
    fn validate(self, defaults: &ControllerSettings) -> ConfigResult<ManagedService> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(ConfigError::EmptyServiceId);
        }

        if self.min_units == 0 || self.min_units > self.max_units {
            return Err(ConfigError::InvalidBounds {
                service: id,
                min: self.min_units,
                max: self.max_units,
            });
        }

        if !(1.0..=100.0).contains(&self.target) {
            return Err(ConfigError::InvalidTarget {
                service: id,
                target: self.target,
            });
        }

        check_bands(&id, &self.bands)?;

        let scale_out_cooldown = parse_duration(&self.scale_out_cooldown)?;
        let scale_in_cooldown = parse_duration(&self.scale_in_cooldown)?;
        if scale_in_cooldown < scale_out_cooldown {
            return Err(ConfigError::CooldownOrdering {
                service: id,
                scale_out: scale_out_cooldown.as_secs(),
                scale_in: scale_in_cooldown.as_secs(),
            });
        }

        let evaluation_periods = self
            .evaluation_periods
            .unwrap_or(defaults.evaluation_periods);
        if evaluation_periods == 0 {
            return Err(ConfigError::InvalidEvaluationPeriods { service: id });
        }

        let scale_in_guard_points = self
            .scale_in_guard_points
            .unwrap_or(defaults.scale_in_guard_points);
        check_guard_band(&id, scale_in_guard_points)?;

        let capacity_policy = match (self.critical, self.capacity_policy) {
            (true, policy) => policy,
            (false, None) => return Err(ConfigError::MissingCapacityPolicy(id)),
            (false, Some(policy)) => {
                check_weights(&id, &policy)?;
                Some(policy)
            }
        };

        let timezone = match self.timezone.as_deref() {
            Some(tz) => parse_timezone(tz)?,
            None => utc_offset(),
        };

        Ok(ManagedService {
            id,
            critical: self.critical,
            min_units: self.min_units,
            max_units: self.max_units,
            metric: self.metric,
            target: self.target,
            bands: self.bands,
            scale_out_cooldown,
            scale_in_cooldown,
            evaluation_periods,
            scale_in_guard_points,
            capacity_policy,
            timezone,
        })
    }
}

impl RawOverrideConfig {
    fn display_name(&self, order: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{}#{order}", self.service))
    }

    fn validate(self, order: usize, service_tz: FixedOffset) -> ConfigResult<ScheduledOverride> {
        let name = self.display_name(order);

        if self.min_units == 0 || self.min_units > self.max_units {
            return Err(ConfigError::InvalidOverrideBounds {
                name,
                min: self.min_units,
                max: self.max_units,
            });
        }

        if self.cron.is_none() && self.valid_from.is_none() && self.valid_until.is_none() {
            return Err(ConfigError::EmptyOverride { name });
        }

        let cron = match self.cron.as_deref() {
            Some(expr) => Some(
                CronExpr::parse(expr)
                    .map_err(|source| ConfigError::InvalidCron {
                        name: name.clone(),
                        source,
                    })?,
            ),
            None => None,
        };
        let window = self.window.as_deref().map(parse_duration).transpose()?;
        if let Some(w) = window
            && (w.is_zero() || w > MAX_OVERRIDE_WINDOW)
        {
            return Err(ConfigError::InvalidWindow { name });
        }
        let timezone = match self.timezone.as_deref() {
            Some(tz) => parse_timezone(tz)?,
            None => service_tz,
        };
        let valid_from = self.valid_from.as_deref().map(parse_timestamp).transpose()?;
        let valid_until = self.valid_until.as_deref().map(parse_timestamp).transpose()?;
        if let (Some(from), Some(until)) = (valid_from, valid_until)
            && from >= until
        {
            return Err(ConfigError::InvalidValidity { name });
        }

        Ok(ScheduledOverride {
            name,
            service_id: self.service,
            cron,
            window,
            timezone,
            bounds: Bounds::new(self.min_units, self.max_units),
            valid_from,
            valid_until,
            bypass_cooldown: self.bypass_cooldown,
            order,
        })
    }
}

fn check_bands(service: &str, bands: &[ThresholdBand]) -> ConfigResult<()> {
    if bands.is_empty() {
        return Err(ConfigError::NoBands(service.to_string()));
    }

    let invalid = |index: usize, reason: &str| ConfigError::InvalidBand {
        service: service.to_string(),
        index,
        reason: reason.to_string(),
    };

    if bands[0].lower < 0.0 {
        return Err(invalid(0, "lower bound must not be negative"));
    }

    let last = bands.len() - 1;
    for (i, band) in bands.iter().enumerate() {
        if band.delta == 0 {
            return Err(invalid(i, "delta must be at least 1"));
        }
        match band.upper {
            Some(_) if i == last => {
                return Err(invalid(i, "final band must be unbounded above"));
            }
            None if i != last => {
                return Err(invalid(i, "only the final band may omit upper"));
            }
            Some(upper) if upper <= band.lower => {
                return Err(invalid(i, "upper must be greater than lower"));
            }
            _ => {}
        }
        if i < last && band.upper != Some(bands[i + 1].lower) {
            return Err(invalid(i + 1, "bands must be contiguous"));
        }
    }
    Ok(())
}

fn check_weights(service: &str, policy: &CapacityClassPolicy) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidWeights {
        service: service.to_string(),
        reason: reason.to_string(),
    };

    let g = policy.guaranteed_base_weight;
    let p = policy.preemptible_weight;
    if !(0.0..=1.0).contains(&g) || !(0.0..=1.0).contains(&p) {
        return Err(invalid("weights must lie in [0, 1]"));
    }
    if (g + p - 1.0).abs() > WEIGHT_EPSILON {
        return Err(invalid("weights must sum to 1"));
    }
    Ok(())
}

fn check_guard_band(service: &str, value: f64) -> ConfigResult<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::InvalidGuardBand {
            service: service.to_string(),
            value,
        });
    }
    Ok(())
}

fn utc_offset() -> FixedOffset {
    Utc.fix()
}
