//! Per-service, per-direction cooldown windows.
//!
//! Scale-out and scale-in are tracked independently: a recent scale-out
//! never blocks a scale-in whose own window has elapsed. Timestamps are
//! only recorded after a change has actually been applied.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_core::{ManagedService, ScaleDirection};

/// Last applied change in each direction for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CooldownState {
    pub last_scale_out_at: Option<DateTime<Utc>>,
    pub last_scale_in_at: Option<DateTime<Utc>>,
}

impl CooldownState {
    pub fn last(&self, direction: ScaleDirection) -> Option<DateTime<Utc>> {
        match direction {
            ScaleDirection::Out => self.last_scale_out_at,
            ScaleDirection::In => self.last_scale_in_at,
        }
    }
}

/// Cooldown bookkeeping keyed by service id.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    states: HashMap<String, CooldownState>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no change in `direction` has been recorded, or the
    /// direction's cooldown has fully elapsed at `now`.
    pub fn is_allowed(
        &self,
        service: &ManagedService,
        direction: ScaleDirection,
        now: DateTime<Utc>,
    ) -> bool {
        self.remaining(service, direction, now).is_none()
    }

    /// Time left before `direction` is allowed again, if any.
    pub fn remaining(
        &self,
        service: &ManagedService,
        direction: ScaleDirection,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        let last = self.states.get(&service.id)?.last(direction)?;
        let cooldown = service.cooldown(direction);
        // A clock that went backwards counts as no time elapsed.
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed >= cooldown {
            None
        } else {
            Some(cooldown - elapsed)
        }
    }

    /// Record an applied change.
    pub fn record(&mut self, service_id: &str, direction: ScaleDirection, now: DateTime<Utc>) {
        let state = self.states.entry(service_id.to_string()).or_default();
        match direction {
            ScaleDirection::Out => state.last_scale_out_at = Some(now),
            ScaleDirection::In => state.last_scale_in_at = Some(now),
        }
    }

    pub fn state(&self, service_id: &str) -> Option<&CooldownState> {
        self.states.get(service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Offset, TimeDelta};
    use fleet_core::{MetricKind, ThresholdBand};

    fn test_service(scale_out: u64, scale_in: u64) -> ManagedService {
        ManagedService {
            id: "api".to_string(),
            critical: true,
            min_units: 1,
            max_units: 10,
            metric: MetricKind::Cpu,
            target: 70.0,
            bands: vec![ThresholdBand {
                lower: 0.0,
                upper: None,
                delta: 1,
            }],
            scale_out_cooldown: Duration::from_secs(scale_out),
            scale_in_cooldown: Duration::from_secs(scale_in),
            evaluation_periods: 2,
            scale_in_guard_points: 20.0,
            capacity_policy: None,
            timezone: Utc.fix(),
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        let base: DateTime<Utc> = "2026-10-18T00:00:00Z".parse().unwrap();
        base + TimeDelta::seconds(secs)
    }

    #[test]
    fn allowed_without_history() {
        let svc = test_service(60, 300);
        let tracker = CooldownTracker::new();
        assert!(tracker.is_allowed(&svc, ScaleDirection::Out, t(0)));
        assert!(tracker.is_allowed(&svc, ScaleDirection::In, t(0)));
    }

    #[test]
    fn blocks_until_cooldown_elapses() {
        let svc = test_service(60, 300);
        let mut tracker = CooldownTracker::new();
        tracker.record("api", ScaleDirection::Out, t(0));

        assert!(!tracker.is_allowed(&svc, ScaleDirection::Out, t(30)));
        assert_eq!(
            tracker.remaining(&svc, ScaleDirection::Out, t(30)),
            Some(Duration::from_secs(30))
        );
        assert!(tracker.is_allowed(&svc, ScaleDirection::Out, t(60)));
        assert!(tracker.is_allowed(&svc, ScaleDirection::Out, t(61)));
    }

    #[test]
    fn directions_are_independent() {
        let svc = test_service(60, 60);
        let mut tracker = CooldownTracker::new();
        tracker.record("api", ScaleDirection::In, t(0));
        tracker.record("api", ScaleDirection::Out, t(100));

        // Scale-out just happened, but scale-in's own window elapsed.
        assert!(tracker.is_allowed(&svc, ScaleDirection::In, t(101)));
        assert!(!tracker.is_allowed(&svc, ScaleDirection::Out, t(101)));
    }

    #[test]
    fn services_do_not_share_state() {
        let api = test_service(60, 300);
        let mut worker = test_service(60, 300);
        worker.id = "worker".to_string();

        let mut tracker = CooldownTracker::new();
        tracker.record("api", ScaleDirection::Out, t(0));
        assert!(tracker.is_allowed(&worker, ScaleDirection::Out, t(1)));
        assert!(!tracker.is_allowed(&api, ScaleDirection::Out, t(1)));
    }

    #[test]
    fn clock_going_backwards_stays_blocked() {
        let svc = test_service(60, 300);
        let mut tracker = CooldownTracker::new();
        tracker.record("api", ScaleDirection::Out, t(100));
        assert!(!tracker.is_allowed(&svc, ScaleDirection::Out, t(50)));
    }

    #[test]
    fn zero_cooldown_always_allows() {
        let svc = test_service(0, 0);
        let mut tracker = CooldownTracker::new();
        tracker.record("api", ScaleDirection::Out, t(0));
        assert!(tracker.is_allowed(&svc, ScaleDirection::Out, t(0)));
    }
}
