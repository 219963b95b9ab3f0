//! fleet-api — REST API for the fleet autoscaler.
//!
//! Metric exporters push samples here; operators read allocations and
//! recent alerts. The controller never depends on this crate.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/samples` | Ingest one or more metric samples |
//! | GET | `/api/v1/services` | List managed services |
//! | GET | `/api/v1/services/{id}/allocation` | Last-known allocation |
//! | GET | `/api/v1/alerts` | Recent alerts |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use fleet_controller::{AllocationBoard, RecordingAlertSink};
use fleet_core::FleetConfig;
use fleet_metrics::SampleStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<FleetConfig>,
    pub samples: SampleStore,
    pub board: AllocationBoard,
    pub alerts: RecordingAlertSink,
}

/// Build the complete API router (REST + metrics + liveness).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/samples", post(handlers::ingest_samples))
        .route("/services", get(handlers::list_services))
        .route("/services/{id}/allocation", get(handlers::get_allocation))
        .route("/alerts", get(handlers::list_alerts))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
        .route("/healthz", get(handlers::healthz))
}
