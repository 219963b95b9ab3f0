//! fleet-schedule — scheduled capacity overrides.
//!
//! An override replaces a service's static `[min_units, max_units]` while
//! its window is active. Windows are either recurring (a cron expression,
//! optionally stretched by a `window` duration) or explicit (a
//! `valid_from`/`valid_until` range, optionally narrowed by a cron).
//!
//! # Resolution
//!
//! ```text
//! active = overrides for service whose window contains now
//! if any explicit override is active:   winner = last-declared explicit
//! else if any recurring one is active:  winner = last-declared recurring
//! else:                                 static bounds apply
//! ```
//!
//! The order is fixed when the config is loaded; nothing depends on
//! wall-clock evaluation order.

pub mod engine;

pub use engine::{ActiveOverride, OverrideEngine};
