//! Capacity-class allocation.
//!
//! Critical services run entirely on guaranteed capacity. Non-critical
//! services get `max(1, ceil(total * guaranteed_share))` guaranteed units
//! and the remainder on preemptible capacity, so a simultaneous
//! preemption can never take the service to zero.

use fleet_core::{CapacityAllocation, ManagedService};

const BASIS_POINTS: u64 = 10_000;

/// Split `total_units` for `service` across capacity classes.
///
/// Deterministic: the same inputs always produce the same allocation.
pub fn allocate(service: &ManagedService, total_units: u32) -> CapacityAllocation {
    let guaranteed_units = match (service.critical, &service.capacity_policy) {
        (false, Some(policy)) if total_units > 0 => {
            let bp = u64::from(policy.guaranteed_basis_points());
            let share = (u64::from(total_units) * bp).div_ceil(BASIS_POINTS);
            // share <= total_units because bp <= 10_000.
            (share as u32).clamp(1, total_units)
        }
        // Critical, or a non-critical service without a policy: never
        // place anything on preemptible capacity.
        _ => total_units,
    };

    CapacityAllocation {
        service_id: service.id.clone(),
        total_units,
        guaranteed_units,
        preemptible_units: total_units - guaranteed_units,
    }
}
