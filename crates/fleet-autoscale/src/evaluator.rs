//! Step-scaling evaluator.
//!
//! Converts the most recent metric samples for a service into a scaling
//! intent. A breach has to hold for `evaluation_periods` consecutive
//! samples; a single spike never triggers action.

use fleet_core::{ManagedService, MetricSample, ScaleDirection};
use tracing::debug;

/// What the evaluator wants to do with a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingIntent {
    /// Inside the dead zone, not enough data, or no band matched.
    None,
    /// Add `delta` units.
    Out { delta: u32 },
    /// Remove `delta` units.
    In { delta: u32 },
}

impl ScalingIntent {
    pub fn direction(&self) -> Option<ScaleDirection> {
        match self {
            ScalingIntent::None => None,
            ScalingIntent::Out { .. } => Some(ScaleDirection::Out),
            ScalingIntent::In { .. } => Some(ScaleDirection::In),
        }
    }

    /// Signed unit change.
    pub fn delta(&self) -> i64 {
        match self {
            ScalingIntent::None => 0,
            ScalingIntent::Out { delta } => i64::from(*delta),
            ScalingIntent::In { delta } => -i64::from(*delta),
        }
    }

    /// Unit count after applying this intent to `current`, before any
    /// bounds are enforced.
    pub fn apply_to(&self, current: u32) -> u32 {
        match self {
            ScalingIntent::None => current,
            ScalingIntent::Out { delta } => current.saturating_add(*delta),
            ScalingIntent::In { delta } => current.saturating_sub(*delta),
        }
    }
}

/// Evaluate a service against its recent samples, ordered oldest first.
///
/// Fewer samples than `evaluation_periods`, or any non-finite value in
/// the window, yields `None`: missing data is treated as not breaching.
pub fn evaluate(service: &ManagedService, recent: &[MetricSample]) -> ScalingIntent {
    let periods = service.evaluation_periods.max(1);
    if recent.len() < periods {
        debug!(
            service = %service.id,
            samples = recent.len(),
            required = periods,
            "not enough samples to evaluate"
        );
        return ScalingIntent::None;
    }

    let window = &recent[recent.len() - periods..];
    if window.iter().any(|s| !s.value.is_finite()) {
        return ScalingIntent::None;
    }
    let current = window[window.len() - 1].value;
    let target = service.target;

    if window.iter().all(|s| s.value > target) {
        let excess = current - target;
        return match service.bands.iter().find(|b| b.contains(excess)) {
            Some(band) => {
                debug!(
                    service = %service.id,
                    current,
                    target,
                    excess,
                    delta = band.delta,
                    "sustained breach above target"
                );
                ScalingIntent::Out { delta: band.delta }
            }
            None => {
                debug!(service = %service.id, excess, "breach below first band");
                ScalingIntent::None
            }
        };
    }

    let low_threshold = target - service.scale_in_guard_points;
    if low_threshold > 0.0 && window.iter().all(|s| s.value < low_threshold) {
        debug!(
            service = %service.id,
            current,
            low_threshold,
            deficit = low_threshold - current,
            "sustained utilization below guard band"
        );
        return ScalingIntent::In { delta: 1 };
    }

    ScalingIntent::None
}
