//! fleet-controller — the reconciliation loop.
//!
//! One [`ServiceWorker`] per managed service, each ticking on its own
//! schedule. Services never wait on each other; within a service ticks
//! are strictly sequential.
//!
//! # Architecture
//!
//! ```text
//! Controller
//!   ├── FleetConfig (read-only, shared)
//!   ├── OverrideEngine (read-only, shared)
//!   ├── AllocationBoard (last-known allocations, read by the API)
//!   └── ServiceWorker per service
//!       ├── CooldownTracker (owned)
//!       ├── MetricSource::samples()         ─┐ bounded by
//!       └── CapacityExecutor::apply_allocation() ─┘ timeouts
//! ```
//!
//! # Tick
//!
//! ```text
//! Idle → Evaluating → Blocked  → Idle   (cooldown active, intent dropped)
//!                   → Applying → Idle   (success: record cooldown)
//!                              → Idle   (failure: alert, resync next tick)
//! ```

pub mod alerts;
pub mod board;
pub mod controller;
pub mod error;
pub mod executor;
pub mod worker;

pub use alerts::{Alert, AlertRecord, AlertSink, FanoutAlertSink, RecordingAlertSink, TracingAlertSink};
pub use board::AllocationBoard;
pub use controller::Controller;
pub use error::{ExecutorError, ExecutorResult, TickError};
pub use executor::{CapacityExecutor, SimulatedExecutor};
pub use worker::{ServiceWorker, TickOutcome, WorkerContext};
