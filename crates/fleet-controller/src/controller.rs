//! Controller: one worker per managed service.

use std::sync::Arc;

use fleet_core::FleetConfig;
use fleet_metrics::MetricSource;
use fleet_schedule::OverrideEngine;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::alerts::AlertSink;
use crate::board::AllocationBoard;
use crate::executor::CapacityExecutor;
use crate::worker::{ServiceWorker, WorkerContext};

pub struct Controller {
    config: Arc<FleetConfig>,
    ctx: WorkerContext,
}

impl Controller {
    pub fn new(
        config: Arc<FleetConfig>,
        metrics: Arc<dyn MetricSource>,
        executor: Arc<dyn CapacityExecutor>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let ctx = WorkerContext {
            engine: Arc::new(OverrideEngine::from_config(&config)),
            metrics,
            executor,
            alerts,
            board: AllocationBoard::new(),
            fetch_timeout: config.controller.fetch_timeout,
            apply_timeout: config.controller.apply_timeout,
        };
        Self { config, ctx }
    }

    /// Shared view of last-known allocations.
    pub fn board(&self) -> AllocationBoard {
        self.ctx.board.clone()
    }

    /// Fresh workers, one per configured service, in declaration order.
    pub fn workers(&self) -> Vec<ServiceWorker> {
        self.config
            .services
            .iter()
            .map(|s| ServiceWorker::new(s.clone(), self.ctx.clone()))
            .collect()
    }

    /// Run every worker until `shutdown` flips, then wait for all of them
    /// to finish their current tick.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let interval = self.config.controller.tick_interval;
        let mut tasks = JoinSet::new();
        for worker in self.workers() {
            tasks.spawn(worker.run(interval, shutdown.clone()));
        }
        info!(
            services = self.config.services.len(),
            interval_secs = interval.as_secs(),
            "controller started"
        );

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "service worker panicked");
            }
        }
        info!("controller stopped");
    }
}
