//! Last-known allocations, shared with the API.
//!
//! Each worker writes only its own service's entry.

use std::collections::HashMap;
use std::sync::Arc;

use fleet_core::CapacityAllocation;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct AllocationBoard {
    entries: Arc<RwLock<HashMap<String, CapacityAllocation>>>,
}

impl AllocationBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, allocation: CapacityAllocation) {
        let mut entries = self.entries.write().await;
        entries.insert(allocation.service_id.clone(), allocation);
    }

    pub async fn get(&self, service_id: &str) -> Option<CapacityAllocation> {
        self.entries.read().await.get(service_id).cloned()
    }

    /// All entries sorted by service id.
    pub async fn list(&self) -> Vec<CapacityAllocation> {
        let mut out: Vec<CapacityAllocation> = self.entries.read().await.values().cloned().collect();
        out.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(service: &str, total: u32) -> CapacityAllocation {
        CapacityAllocation {
            service_id: service.to_string(),
            total_units: total,
            guaranteed_units: total,
            preemptible_units: 0,
        }
    }

    #[tokio::test]
    async fn publish_replaces_previous_entry() {
        let board = AllocationBoard::new();
        board.publish(alloc("worker", 3)).await;
        board.publish(alloc("api", 5)).await;
        board.publish(alloc("api", 8)).await;

        assert_eq!(board.get("api").await.unwrap().total_units, 8);
        let ids: Vec<String> = board.list().await.into_iter().map(|a| a.service_id).collect();
        assert_eq!(ids, vec!["api", "worker"]);
        assert!(board.get("missing").await.is_none());
    }
}
