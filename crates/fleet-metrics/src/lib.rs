//! fleet-metrics — metric sources for the reconciliation loop.
//!
//! The controller only ever talks to a [`MetricSource`]. A source must
//! distinguish "no data" from a real reading: [`SampleWindow::NoData`]
//! is never papered over with a stale or zero value.
//!
//! [`SampleStore`] is the in-process source used by the daemon (samples
//! are pushed to it over the API) and by tests. [`render_prometheus`]
//! exposes the controller's current allocations for scraping.

pub mod prometheus;
pub mod source;
pub mod store;

pub use prometheus::render_prometheus;
pub use source::{MetricError, MetricResult, MetricSource, SampleWindow};
pub use store::SampleStore;
