//! fleet-autoscale — metric-driven scaling decisions.
//!
//! Pure, synchronous building blocks used by the reconciliation loop:
//!
//! - [`evaluate`] turns recent samples into a [`ScalingIntent`]
//! - [`CooldownTracker`] gates intents per direction
//! - [`allocate`] splits a unit count across capacity classes
//!
//! # Scaling Algorithm
//!
//! ```text
//! window = last N samples (N = evaluation_periods, default 2)
//!
//! if every sample in window > target:
//!     excess = current - target
//!     ScaleOut(band containing excess .delta)   // last band unbounded
//!
//! if every sample in window < target - guard (default 20 points):
//!     ScaleIn(1)
//!
//! otherwise: None
//! ```
//!
//! Scale-out is graduated by band; scale-in always removes a single unit.

pub mod allocator;
pub mod cooldown;
pub mod evaluator;

pub use allocator::allocate;
pub use cooldown::{CooldownState, CooldownTracker};
pub use evaluator::{ScalingIntent, evaluate};
