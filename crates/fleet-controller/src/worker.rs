//! Per-service reconciliation worker.
//!
//! A worker owns its service's cooldown state and last-known unit count.
//! Nothing else mutates either, so a tick never needs a lock beyond the
//! `&mut self` it already holds.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleet_autoscale::{CooldownTracker, ScalingIntent, allocate, evaluate};
use fleet_core::{CapacityAllocation, ManagedService, MetricSample, ScaleDirection};
use fleet_metrics::{MetricSource, SampleWindow};
use fleet_schedule::{ActiveOverride, OverrideEngine};
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, info, warn};

use crate::alerts::{Alert, AlertSink};
use crate::board::AllocationBoard;
use crate::error::TickError;
use crate::executor::CapacityExecutor;

/// Handles shared by every worker. Cloning is cheap.
#[derive(Clone)]
pub struct WorkerContext {
    pub engine: Arc<OverrideEngine>,
    pub metrics: Arc<dyn MetricSource>,
    pub executor: Arc<dyn CapacityExecutor>,
    pub alerts: Arc<dyn AlertSink>,
    pub board: AllocationBoard,
    pub fetch_timeout: Duration,
    pub apply_timeout: Duration,
}

/// What a single tick did.
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Nothing to change. `units` is `None` until the first sync succeeds.
    Idle { units: Option<u32> },
    /// A change was wanted but its direction is still cooling down.
    Blocked {
        direction: ScaleDirection,
        remaining: Duration,
    },
    /// The executor accepted a new allocation.
    Applied {
        from: u32,
        allocation: CapacityAllocation,
        direction: ScaleDirection,
        bypassed_cooldown: bool,
    },
    Failed(TickError),
}

impl TickOutcome {
    /// Unit count the service is known to run after this tick.
    pub fn units(&self) -> Option<u32> {
        match self {
            TickOutcome::Idle { units } => *units,
            TickOutcome::Applied { allocation, .. } => Some(allocation.total_units),
            TickOutcome::Blocked { .. } | TickOutcome::Failed(_) => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TickOutcome::Applied { .. })
    }
}

/// Identity of the active override set, used to log changes once.
type OverrideSet = Option<(String, Vec<String>)>;

pub struct ServiceWorker {
    service: ManagedService,
    ctx: WorkerContext,
    cooldowns: CooldownTracker,
    current: Option<u32>,
    /// Set after an apply failure; cleared by a successful `current_units`.
    resync_pending: bool,
    /// True while the metric source has nothing for this service.
    metrics_down: bool,
    last_override: OverrideSet,
}

impl ServiceWorker {
    pub fn new(service: ManagedService, ctx: WorkerContext) -> Self {
        Self {
            service,
            ctx,
            cooldowns: CooldownTracker::new(),
            current: None,
            resync_pending: false,
            metrics_down: false,
            last_override: None,
        }
    }

    pub fn service(&self) -> &ManagedService {
        &self.service
    }

    /// Last-known unit count, `None` before the first successful sync.
    pub fn current_units(&self) -> Option<u32> {
        self.current
    }

    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Run one reconciliation pass as of `now`.
    ///
    /// Each tick starts from fresh metrics; a blocked intent is dropped,
    /// not queued.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let current = match self.sync().await {
            Ok(units) => units,
            Err(e) => return TickOutcome::Failed(e),
        };

        // Evaluating
        let active = self.ctx.engine.active_override(&self.service.id, now);
        self.note_override(active.as_ref());

        let (intent, metric_error) = match self.fetch_samples(now).await {
            Ok(samples) => (evaluate(&self.service, &samples), None),
            Err(e) => (ScalingIntent::None, Some(e)),
        };

        let bounds = active
            .as_ref()
            .map(|ov| ov.bounds)
            .unwrap_or_else(|| self.service.bounds());
        let target = bounds.clamp(intent.apply_to(current));

        if target == current {
            debug!(service = %self.service.id, units = current, ?intent, "no change");
            return match metric_error {
                Some(e) => TickOutcome::Failed(e),
                None => TickOutcome::Idle {
                    units: Some(current),
                },
            };
        }

        let direction = if target > current {
            ScaleDirection::Out
        } else {
            ScaleDirection::In
        };
        let bypass = active.as_ref().is_some_and(|ov| ov.bypass_cooldown);

        if !bypass
            && let Some(remaining) = self.cooldowns.remaining(&self.service, direction, now)
        {
            debug!(
                service = %self.service.id,
                %direction,
                from = current,
                to = target,
                remaining_secs = remaining.as_secs(),
                "blocked by cooldown"
            );
            return TickOutcome::Blocked {
                direction,
                remaining,
            };
        }

        // Applying
        let allocation = allocate(&self.service, target);
        if let Err(e) = self.apply(&allocation).await {
            self.resync_pending = true;
            self.ctx
                .alerts
                .notify(Alert::ApplyFailed {
                    service: self.service.id.clone(),
                    units: target,
                    error: e.to_string(),
                })
                .await;
            return TickOutcome::Failed(e);
        }

        self.cooldowns.record(&self.service.id, direction, now);
        self.current = Some(target);
        self.ctx.board.publish(allocation.clone()).await;

        if bypass && let Some(ov) = &active {
            self.ctx
                .alerts
                .notify(Alert::CooldownBypassed {
                    service: self.service.id.clone(),
                    override_name: ov.name.clone(),
                    from: current,
                    to: target,
                })
                .await;
        }
        if target == bounds.max && current < bounds.max {
            self.ctx
                .alerts
                .notify(Alert::NearCapacity {
                    service: self.service.id.clone(),
                    units: target,
                    max_units: bounds.max,
                })
                .await;
        }

        TickOutcome::Applied {
            from: current,
            allocation,
            direction,
            bypassed_cooldown: bypass,
        }
    }

    /// Tick every `interval` until `shutdown` flips.
    ///
    /// A tick that is already running finishes before the shutdown
    /// signal is observed.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            service = %self.service.id,
            interval_secs = interval.as_secs(),
            "service worker started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let outcome = self.tick(Utc::now()).await;
                    self.log_outcome(&outcome);
                }
            }
        }

        info!(service = %self.service.id, "service worker stopped");
    }

    /// Read the executor's unit count when needed. A failed resync after
    /// an apply failure keeps the previous baseline.
    async fn sync(&mut self) -> Result<u32, TickError> {
        if let Some(current) = self.current
            && !self.resync_pending
        {
            return Ok(current);
        }

        let result = match timeout(
            self.ctx.apply_timeout,
            self.ctx.executor.current_units(&self.service.id),
        )
        .await
        {
            Ok(Ok(units)) => Ok(units),
            Ok(Err(source)) => Err(TickError::Resync {
                service: self.service.id.clone(),
                source,
            }),
            Err(_) => Err(TickError::Timeout {
                service: self.service.id.clone(),
                operation: "current units",
                timeout: self.ctx.apply_timeout,
            }),
        };

        match (result, self.current) {
            (Ok(units), previous) => {
                if previous != Some(units) {
                    info!(service = %self.service.id, ?previous, units, "synced with executor");
                }
                self.current = Some(units);
                self.resync_pending = false;
                self.ctx.board.publish(allocate(&self.service, units)).await;
                Ok(units)
            }
            (Err(e), Some(previous)) => {
                warn!(
                    service = %self.service.id,
                    error = %e,
                    units = previous,
                    "resync failed, keeping last-known units"
                );
                Ok(previous)
            }
            (Err(e), None) => {
                warn!(service = %self.service.id, error = %e, "initial sync failed");
                Err(e)
            }
        }
    }

    async fn fetch_samples(&mut self, now: DateTime<Utc>) -> Result<Vec<MetricSample>, TickError> {
        let query = self.ctx.metrics.samples(
            &self.service.id,
            self.service.metric,
            self.service.evaluation_periods,
            now,
        );
        let result = match timeout(self.ctx.fetch_timeout, query).await {
            Ok(Ok(SampleWindow::Samples(samples))) => Ok(samples),
            Ok(Ok(SampleWindow::NoData)) => Err(TickError::MetricUnavailable {
                service: self.service.id.clone(),
                reason: "no data".to_string(),
            }),
            Ok(Err(e)) => Err(TickError::MetricUnavailable {
                service: self.service.id.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(TickError::Timeout {
                service: self.service.id.clone(),
                operation: "metric fetch",
                timeout: self.ctx.fetch_timeout,
            }),
        };

        match &result {
            Ok(_) if self.metrics_down => {
                self.metrics_down = false;
                info!(service = %self.service.id, "metrics available again");
            }
            Err(e) if !self.metrics_down => {
                self.metrics_down = true;
                self.ctx
                    .alerts
                    .notify(Alert::MetricsUnavailable {
                        service: self.service.id.clone(),
                        reason: e.to_string(),
                    })
                    .await;
            }
            _ => {}
        }
        result
    }

    async fn apply(&self, allocation: &CapacityAllocation) -> Result<(), TickError> {
        match timeout(
            self.ctx.apply_timeout,
            self.ctx.executor.apply_allocation(allocation),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(TickError::ApplyFailure {
                service: self.service.id.clone(),
                source,
            }),
            Err(_) => Err(TickError::Timeout {
                service: self.service.id.clone(),
                operation: "apply",
                timeout: self.ctx.apply_timeout,
            }),
        }
    }

    fn note_override(&mut self, active: Option<&ActiveOverride>) {
        let set: OverrideSet = active.map(|ov| (ov.name.clone(), ov.shadowed.clone()));
        if set == self.last_override {
            return;
        }

        match active {
            Some(ov) if ov.is_conflict() => warn!(
                service = %self.service.id,
                winner = %ov.name,
                shadowed = ?ov.shadowed,
                "override conflict, most specific wins"
            ),
            Some(ov) => info!(
                service = %self.service.id,
                name = %ov.name,
                bounds = %ov.bounds,
                "override active"
            ),
            None => info!(service = %self.service.id, "override ended"),
        }
        self.last_override = set;
    }

    fn log_outcome(&self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Applied {
                from,
                allocation,
                direction,
                bypassed_cooldown,
            } => info!(
                service = %self.service.id,
                %direction,
                from,
                to = allocation.total_units,
                guaranteed = allocation.guaranteed_units,
                preemptible = allocation.preemptible_units,
                bypassed_cooldown,
                "allocation applied"
            ),
            TickOutcome::Failed(e) => warn!(service = %self.service.id, error = %e, "tick failed"),
            TickOutcome::Blocked { .. } | TickOutcome::Idle { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::RecordingAlertSink;
    use crate::executor::SimulatedExecutor;
    use chrono::{Offset, TimeDelta};
    use fleet_core::{MetricKind, ThresholdBand};
    use fleet_metrics::SampleStore;

    fn service() -> ManagedService {
        ManagedService {
            id: "api".to_string(),
            critical: true,
            min_units: 2,
            max_units: 20,
            metric: MetricKind::Cpu,
            target: 70.0,
            bands: vec![ThresholdBand {
                lower: 0.0,
                upper: None,
                delta: 1,
            }],
            scale_out_cooldown: Duration::from_secs(60),
            scale_in_cooldown: Duration::from_secs(60),
            evaluation_periods: 2,
            scale_in_guard_points: 20.0,
            capacity_policy: None,
            timezone: Utc.fix(),
        }
    }

    fn worker(store: &SampleStore, exec: &SimulatedExecutor, alerts: &RecordingAlertSink) -> ServiceWorker {
        let ctx = WorkerContext {
            engine: Arc::new(OverrideEngine::default()),
            metrics: Arc::new(store.clone()),
            executor: Arc::new(exec.clone()),
            alerts: Arc::new(alerts.clone()),
            board: AllocationBoard::new(),
            fetch_timeout: Duration::from_secs(1),
            apply_timeout: Duration::from_secs(1),
        };
        ServiceWorker::new(service(), ctx)
    }

    fn now() -> DateTime<Utc> {
        "2026-10-18T12:00:00Z".parse().unwrap()
    }

    async fn push(store: &SampleStore, values: &[f64]) {
        for (i, v) in values.iter().enumerate() {
            store
                .record(MetricSample {
                    service_id: "api".to_string(),
                    metric: MetricKind::Cpu,
                    value: *v,
                    timestamp: now() + TimeDelta::seconds(i as i64),
                })
                .await;
        }
    }

    #[tokio::test]
    async fn unsynced_worker_makes_no_decision() {
        let store = SampleStore::new();
        let exec = SimulatedExecutor::new();
        let alerts = RecordingAlertSink::new(10);
        let mut w = worker(&store, &exec, &alerts);
        push(&store, &[99.0, 99.0]).await;

        let outcome = w.tick(now()).await;
        assert!(matches!(outcome, TickOutcome::Failed(TickError::Resync { .. })));
        assert_eq!(exec.apply_calls(), 0);
        assert!(w.current_units().is_none());

        exec.set_units("api", 4).await;
        let outcome = w.tick(now()).await;
        assert!(outcome.is_applied());
        assert_eq!(w.current_units(), Some(5));
    }

    #[tokio::test]
    async fn startup_publishes_synced_allocation() {
        let store = SampleStore::new();
        let exec = SimulatedExecutor::new();
        exec.set_units("api", 6).await;
        let alerts = RecordingAlertSink::new(10);
        let mut w = worker(&store, &exec, &alerts);
        push(&store, &[70.0, 70.0]).await;

        let outcome = w.tick(now()).await;
        assert!(matches!(outcome, TickOutcome::Idle { units: Some(6) }));
        assert_eq!(w.ctx.board.get("api").await.unwrap().total_units, 6);
    }

    #[tokio::test]
    async fn apply_timeout_is_a_failure() {
        let store = SampleStore::new();
        let exec = SimulatedExecutor::new().with_apply_delay(Duration::from_millis(200));
        exec.set_units("api", 4).await;
        let alerts = RecordingAlertSink::new(10);
        let mut w = worker(&store, &exec, &alerts);
        w.ctx.apply_timeout = Duration::from_millis(20);
        push(&store, &[99.0, 99.0]).await;

        let outcome = w.tick(now()).await;
        assert!(matches!(
            outcome,
            TickOutcome::Failed(TickError::Timeout {
                operation: "apply",
                ..
            })
        ));
        assert!(w.cooldowns().state("api").is_none());
        assert!(matches!(alerts.alerts().await[0], Alert::ApplyFailed { .. }));
    }

    #[tokio::test]
    async fn executor_query_is_bounded_by_apply_timeout() {
        let store = SampleStore::new();
        let exec = SimulatedExecutor::new().with_query_delay(Duration::from_millis(100));
        exec.set_units("api", 4).await;
        let alerts = RecordingAlertSink::new(10);
        let mut w = worker(&store, &exec, &alerts);
        w.ctx.fetch_timeout = Duration::from_millis(20);
        push(&store, &[70.0, 70.0]).await;

        let outcome = w.tick(now()).await;
        assert!(matches!(outcome, TickOutcome::Idle { units: Some(4) }));

        let mut fresh = worker(&store, &exec, &alerts);
        fresh.ctx.apply_timeout = Duration::from_millis(20);
        assert!(matches!(
            fresh.tick(now()).await,
            TickOutcome::Failed(TickError::Timeout {
                operation: "current units",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let store = SampleStore::new();
        let exec = SimulatedExecutor::new();
        exec.set_units("api", 4).await;
        let alerts = RecordingAlertSink::new(10);
        let w = worker(&store, &exec, &alerts);

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(w.run(Duration::from_millis(10), rx));
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
