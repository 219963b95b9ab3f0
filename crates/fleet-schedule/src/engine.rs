//! Scheduled override engine.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use fleet_core::{Bounds, FleetConfig, ScheduledOverride};

/// Matching minutes without an explicit `window` stay active for one minute.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// The override currently in force for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveOverride {
    pub name: String,
    pub bounds: Bounds,
    pub bypass_cooldown: bool,
    pub explicit: bool,
    /// Other active overrides that lost to this one, highest precedence first.
    pub shadowed: Vec<String>,
}

impl ActiveOverride {
    pub fn is_conflict(&self) -> bool {
        !self.shadowed.is_empty()
    }
}

/// Resolves which override (if any) applies to a service at a moment.
///
/// Read-only after construction; safe to share across workers.
#[derive(Debug, Clone, Default)]
pub struct OverrideEngine {
    /// service_id → overrides, highest precedence first.
    by_service: HashMap<String, Vec<ScheduledOverride>>,
}

impl OverrideEngine {
    pub fn new(overrides: &[ScheduledOverride]) -> Self {
        let mut by_service: HashMap<String, Vec<ScheduledOverride>> = HashMap::new();
        for ov in overrides {
            by_service
                .entry(ov.service_id.clone())
                .or_default()
                .push(ov.clone());
        }
        for list in by_service.values_mut() {
            list.sort_by(|a, b| {
                b.is_explicit()
                    .cmp(&a.is_explicit())
                    .then(b.order.cmp(&a.order))
            });
        }
        Self { by_service }
    }

    pub fn from_config(config: &FleetConfig) -> Self {
        Self::new(&config.overrides)
    }

    /// Overrides declared for a service, highest precedence first.
    pub fn overrides_for(&self, service_id: &str) -> &[ScheduledOverride] {
        self.by_service
            .get(service_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The winning override for `service_id` at `now`, if any is active.
    pub fn active_override(&self, service_id: &str, now: DateTime<Utc>) -> Option<ActiveOverride> {
        let mut active = self
            .overrides_for(service_id)
            .iter()
            .filter(|ov| is_active(ov, now));

        let winner = active.next()?;
        Some(ActiveOverride {
            name: winner.name.clone(),
            bounds: winner.bounds,
            bypass_cooldown: winner.bypass_cooldown,
            explicit: winner.is_explicit(),
            shadowed: active.map(|ov| ov.name.clone()).collect(),
        })
    }
}

/// Whether a single override's window contains `now`.
pub fn is_active(ov: &ScheduledOverride, now: DateTime<Utc>) -> bool {
    if ov.is_explicit() && !ov.within_validity(now) {
        return false;
    }
    match &ov.cron {
        Some(_) => cron_window_contains(ov, now),
        // Explicit-only window, already checked above.
        None => ov.is_explicit(),
    }
}

/// True if some cron fire minute `f` satisfies `f <= now < f + window`,
/// with `f` evaluated in the override's timezone.
fn cron_window_contains(ov: &ScheduledOverride, now: DateTime<Utc>) -> bool {
    let Some(cron) = &ov.cron else {
        return false;
    };
    let window = ov.window.unwrap_or(DEFAULT_WINDOW);
    let Ok(window) = TimeDelta::from_std(window) else {
        return false;
    };

    let local = now.with_timezone(&ov.timezone);
    let Some(mut candidate) = local.with_second(0).and_then(|t| t.with_nanosecond(0)) else {
        return false;
    };

    let one_minute = TimeDelta::minutes(1);
    while candidate + window > local {
        if cron.matches(&candidate) {
            return true;
        }
        candidate -= one_minute;
    }
    false
}
