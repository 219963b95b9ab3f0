//! Core data model shared by every fleet crate.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::cron::CronExpr;

/// Utilization signal a service scales on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Average CPU utilization, percent.
    Cpu,
    /// Average memory utilization, percent.
    Memory,
    /// Requests per second per unit, as a percentage of rated capacity.
    RequestRate,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::RequestRate => "request_rate",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a step-scaling policy.
///
/// Bounds are expressed in percentage points above the service's target.
/// The band covers `[lower, upper)`; `upper == None` means unbounded above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub lower: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<f64>,
    /// Units to add when this band matches.
    pub delta: u32,
}

impl ThresholdBand {
    pub fn contains(&self, excess: f64) -> bool {
        excess >= self.lower && self.upper.is_none_or(|upper| excess < upper)
    }
}

/// Split between guaranteed and preemptible capacity for non-critical
/// services. Both weights lie in `[0, 1]` and sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacityClassPolicy {
    pub guaranteed_base_weight: f64,
    pub preemptible_weight: f64,
}

impl CapacityClassPolicy {
    /// Guaranteed share in basis points (0..=10_000), rounded up so the
    /// integer share is never below the configured weight.
    ///
    /// Allocation works on this integer so that the same input always
    /// yields the same split.
    pub fn guaranteed_basis_points(&self) -> u32 {
        // Absorbs representation error such as 0.3 * 10_000 = 3000.0000000000005.
        const SLACK: f64 = 1e-6;
        let bp = self.guaranteed_base_weight.clamp(0.0, 1.0) * 10_000.0;
        ((bp - SLACK).ceil().max(0.0) as u32).min(10_000)
    }
}

/// Inclusive unit-count bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
}

impl Bounds {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, units: u32) -> u32 {
        units.clamp(self.min, self.max)
    }

    pub fn contains(&self, units: u32) -> bool {
        units >= self.min && units <= self.max
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Direction of a capacity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleDirection {
    Out,
    In,
}

impl fmt::Display for ScaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleDirection::Out => f.write_str("scale-out"),
            ScaleDirection::In => f.write_str("scale-in"),
        }
    }
}

/// One scaling domain: a tier of identical execution units.
///
/// Built once from configuration and immutable for the life of the
/// controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedService {
    pub id: String,
    /// Critical services run entirely on guaranteed capacity.
    pub critical: bool,
    pub min_units: u32,
    pub max_units: u32,
    pub metric: MetricKind,
    /// Target utilization, percent (1..=100).
    pub target: f64,
    /// Ordered, contiguous scale-out bands; the last is unbounded above.
    pub bands: Vec<ThresholdBand>,
    pub scale_out_cooldown: Duration,
    pub scale_in_cooldown: Duration,
    /// Consecutive breaching samples required before acting.
    pub evaluation_periods: usize,
    /// Points below target the metric must fall before scaling in.
    pub scale_in_guard_points: f64,
    /// Only consulted when `critical == false`.
    pub capacity_policy: Option<CapacityClassPolicy>,
    /// Default timezone for this service's scheduled overrides.
    pub timezone: FixedOffset,
}

impl ManagedService {
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min_units, self.max_units)
    }

    pub fn cooldown(&self, direction: ScaleDirection) -> Duration {
        match direction {
            ScaleDirection::Out => self.scale_out_cooldown,
            ScaleDirection::In => self.scale_in_cooldown,
        }
    }
}

/// A time-windowed replacement for a service's static bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledOverride {
    pub name: String,
    pub service_id: String,
    pub cron: Option<CronExpr>,
    /// How long the override stays active after each cron fire minute.
    /// `None` means only the matching minutes themselves.
    pub window: Option<Duration>,
    pub timezone: FixedOffset,
    pub bounds: Bounds,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub bypass_cooldown: bool,
    /// Position in the configuration document; later wins ties.
    pub order: usize,
}

impl ScheduledOverride {
    /// An explicit override carries a validity window and beats any
    /// purely recurring one.
    pub fn is_explicit(&self) -> bool {
        self.valid_from.is_some() || self.valid_until.is_some()
    }

    pub fn within_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.is_none_or(|from| now >= from)
            && self.valid_until.is_none_or(|until| now < until)
    }
}

/// A single utilization reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub service_id: String,
    pub metric: MetricKind,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// The controller's output for one service.
///
/// `guaranteed_units + preemptible_units == total_units` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapacityAllocation {
    pub service_id: String,
    pub total_units: u32,
    pub guaranteed_units: u32,
    pub preemptible_units: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_contains_is_half_open() {
        let band = ThresholdBand {
            lower: 10.0,
            upper: Some(20.0),
            delta: 2,
        };
        assert!(band.contains(10.0));
        assert!(band.contains(19.99));
        assert!(!band.contains(20.0));
        assert!(!band.contains(9.99));
    }

    #[test]
    fn unbounded_band_accepts_any_larger_excess() {
        let band = ThresholdBand {
            lower: 30.0,
            upper: None,
            delta: 4,
        };
        assert!(band.contains(30.0));
        assert!(band.contains(1_000.0));
        assert!(!band.contains(29.0));
    }

    #[test]
    fn bounds_clamp() {
        let b = Bounds::new(2, 20);
        assert_eq!(b.clamp(0), 2);
        assert_eq!(b.clamp(7), 7);
        assert_eq!(b.clamp(25), 20);
        assert!(b.contains(20));
        assert!(!b.contains(21));
    }

    #[test]
    fn basis_points_are_exact_for_decimal_weights() {
        let policy = CapacityClassPolicy {
            guaranteed_base_weight: 0.3,
            preemptible_weight: 0.7,
        };
        assert_eq!(policy.guaranteed_basis_points(), 3_000);
    }

    #[test]
    fn sub_basis_point_weights_round_up() {
        let policy = CapacityClassPolicy {
            guaranteed_base_weight: 0.33334,
            preemptible_weight: 0.66666,
        };
        assert_eq!(policy.guaranteed_basis_points(), 3_334);
    }

    #[test]
    fn explicit_override_validity_is_half_open() {
        let from: DateTime<Utc> = "2026-11-11T00:00:00Z".parse().unwrap();
        let until: DateTime<Utc> = "2026-11-12T00:00:00Z".parse().unwrap();
        let ov = ScheduledOverride {
            name: "flash-sale".into(),
            service_id: "api".into(),
            cron: None,
            window: None,
            timezone: FixedOffset::east_opt(0).unwrap(),
            bounds: Bounds::new(20, 20),
            valid_from: Some(from),
            valid_until: Some(until),
            bypass_cooldown: false,
            order: 0,
        };
        assert!(ov.is_explicit());
        assert!(ov.within_validity(from));
        assert!(!ov.within_validity(until));
    }
}
