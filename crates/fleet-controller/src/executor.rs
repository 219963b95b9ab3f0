//! Capacity executor interface.
//!
//! The executor owns real provisioning; the controller only submits
//! allocations and reads back the running count. `SimulatedExecutor`
//! keeps everything in memory for the daemon's dry-run mode and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleet_core::{CapacityAllocation, FleetConfig};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ExecutorError, ExecutorResult};

#[async_trait]
pub trait CapacityExecutor: Send + Sync {
    /// Bring the service to `allocation`.
    async fn apply_allocation(&self, allocation: &CapacityAllocation) -> ExecutorResult<()>;

    /// Units the service is actually running right now.
    async fn current_units(&self, service_id: &str) -> ExecutorResult<u32>;
}

/// In-memory executor with injectable failures.
#[derive(Clone, Default)]
pub struct SimulatedExecutor {
    units: Arc<RwLock<HashMap<String, u32>>>,
    allocations: Arc<RwLock<HashMap<String, CapacityAllocation>>>,
    /// service_id → remaining applies to reject.
    failures: Arc<RwLock<HashMap<String, u32>>>,
    unreachable: Arc<AtomicBool>,
    apply_delay: Option<Duration>,
    query_delay: Option<Duration>,
    apply_calls: Arc<AtomicU64>,
}

impl SimulatedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every configured service at its `min_units`.
    pub fn from_config(config: &FleetConfig) -> Self {
        let units = config
            .services
            .iter()
            .map(|s| (s.id.clone(), s.min_units))
            .collect();
        Self {
            units: Arc::new(RwLock::new(units)),
            ..Self::default()
        }
    }

    /// Pretend `service_id` is currently running `units`.
    pub async fn set_units(&self, service_id: &str, units: u32) {
        self.units.write().await.insert(service_id.to_string(), units);
    }

    /// Reject the next `count` applies for `service_id`.
    pub async fn fail_next_applies(&self, service_id: &str, count: u32) {
        self.failures
            .write()
            .await
            .insert(service_id.to_string(), count);
    }

    /// Make every call fail with `Unreachable` until cleared.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Sleep this long inside every apply.
    pub fn with_apply_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    /// Sleep this long inside every `current_units` query.
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    /// Number of `apply_allocation` calls received, successful or not.
    pub fn apply_calls(&self) -> u64 {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub async fn allocation(&self, service_id: &str) -> Option<CapacityAllocation> {
        self.allocations.read().await.get(service_id).cloned()
    }

    fn check_reachable(&self) -> ExecutorResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ExecutorError::Unreachable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CapacityExecutor for SimulatedExecutor {
    async fn apply_allocation(&self, allocation: &CapacityAllocation) -> ExecutorResult<()> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.apply_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_reachable()?;

        {
            let mut failures = self.failures.write().await;
            if let Some(remaining) = failures.get_mut(&allocation.service_id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(ExecutorError::Rejected("simulated failure".to_string()));
            }
        }

        self.units
            .write()
            .await
            .insert(allocation.service_id.clone(), allocation.total_units);
        self.allocations
            .write()
            .await
            .insert(allocation.service_id.clone(), allocation.clone());
        info!(
            service = %allocation.service_id,
            total = allocation.total_units,
            guaranteed = allocation.guaranteed_units,
            preemptible = allocation.preemptible_units,
            "simulated allocation applied"
        );
        Ok(())
    }

    async fn current_units(&self, service_id: &str) -> ExecutorResult<u32> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        self.check_reachable()?;
        let units = self
            .units
            .read()
            .await
            .get(service_id)
            .copied()
            .ok_or_else(|| ExecutorError::UnknownService(service_id.to_string()))?;
        debug!(service = %service_id, units, "simulated current units");
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(total: u32) -> CapacityAllocation {
        CapacityAllocation {
            service_id: "api".to_string(),
            total_units: total,
            guaranteed_units: total,
            preemptible_units: 0,
        }
    }

    #[tokio::test]
    async fn apply_updates_current_units() {
        let exec = SimulatedExecutor::new();
        exec.set_units("api", 5).await;
        exec.apply_allocation(&alloc(8)).await.unwrap();

        assert_eq!(exec.current_units("api").await.unwrap(), 8);
        assert_eq!(exec.allocation("api").await, Some(alloc(8)));
        assert_eq!(exec.apply_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_service_errors() {
        let exec = SimulatedExecutor::new();
        assert!(matches!(
            exec.current_units("nope").await,
            Err(ExecutorError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let exec = SimulatedExecutor::new();
        exec.set_units("api", 5).await;
        exec.fail_next_applies("api", 1).await;

        assert!(exec.apply_allocation(&alloc(6)).await.is_err());
        assert_eq!(exec.current_units("api").await.unwrap(), 5);
        assert!(exec.apply_allocation(&alloc(6)).await.is_ok());
        assert_eq!(exec.apply_calls(), 2);
    }

    #[tokio::test]
    async fn unreachable_fails_everything() {
        let exec = SimulatedExecutor::new();
        exec.set_units("api", 5).await;
        exec.set_unreachable(true);
        assert!(exec.current_units("api").await.is_err());
        assert!(exec.apply_allocation(&alloc(6)).await.is_err());

        exec.set_unreachable(false);
        assert_eq!(exec.current_units("api").await.unwrap(), 5);
    }
}
