//! REST API handlers.
//!
//! Handlers only read controller state; the sole write path is sample
//! ingestion into the `SampleStore`.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use fleet_core::{CapacityAllocation, MetricKind, MetricSample};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Samples ────────────────────────────────────────────────────

/// One pushed reading. `metric` defaults to the service's scaling
/// metric, `timestamp` to the time of receipt.
#[derive(Debug, Deserialize)]
pub struct SampleInput {
    pub service_id: String,
    pub metric: Option<MetricKind>,
    pub value: f64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Request body: a single sample or an array of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SampleBatch {
    One(SampleInput),
    Many(Vec<SampleInput>),
}

impl SampleBatch {
    fn into_vec(self) -> Vec<SampleInput> {
        match self {
            SampleBatch::One(s) => vec![s],
            SampleBatch::Many(v) => v,
        }
    }
}

/// POST /api/v1/samples
///
/// The batch is validated as a whole; nothing is recorded if any entry
/// is rejected.
pub async fn ingest_samples(
    State(state): State<ApiState>,
    Json(batch): Json<SampleBatch>,
) -> impl IntoResponse {
    let now = Utc::now();
    let mut samples = Vec::new();

    for input in batch.into_vec() {
        let Some(service) = state.config.service(&input.service_id) else {
            return error_response(
                &format!("unknown service: {}", input.service_id),
                StatusCode::NOT_FOUND,
            )
            .into_response();
        };
        if !input.value.is_finite() {
            return error_response(
                &format!("sample value for {} is not finite", input.service_id),
                StatusCode::BAD_REQUEST,
            )
            .into_response();
        }
        samples.push(MetricSample {
            metric: input.metric.unwrap_or(service.metric),
            service_id: input.service_id,
            value: input.value,
            timestamp: input.timestamp.unwrap_or(now),
        });
    }

    let accepted = samples.len();
    state.samples.record_all(samples).await;
    debug!(accepted, "samples ingested");

    (
        StatusCode::ACCEPTED,
        ApiResponse::ok(serde_json::json!({ "accepted": accepted })),
    )
        .into_response()
}

// ── Services ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub id: String,
    pub critical: bool,
    pub metric: MetricKind,
    pub target: f64,
    pub min_units: u32,
    pub max_units: u32,
    pub scale_out_cooldown_secs: u64,
    pub scale_in_cooldown_secs: u64,
    /// Override names, highest precedence first.
    pub overrides: Vec<String>,
    pub allocation: Option<CapacityAllocation>,
}

/// GET /api/v1/services
pub async fn list_services(State(state): State<ApiState>) -> impl IntoResponse {
    let mut out = Vec::with_capacity(state.config.services.len());
    for svc in &state.config.services {
        out.push(ServiceSummary {
            id: svc.id.clone(),
            critical: svc.critical,
            metric: svc.metric,
            target: svc.target,
            min_units: svc.min_units,
            max_units: svc.max_units,
            scale_out_cooldown_secs: svc.scale_out_cooldown.as_secs(),
            scale_in_cooldown_secs: svc.scale_in_cooldown.as_secs(),
            overrides: state
                .config
                .precedence(&svc.id)
                .iter()
                .map(|ov| ov.name.clone())
                .collect(),
            allocation: state.board.get(&svc.id).await,
        });
    }
    ApiResponse::ok(out)
}

/// GET /api/v1/services/{id}/allocation
pub async fn get_allocation(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if state.config.service(&id).is_none() {
        return error_response("service not found", StatusCode::NOT_FOUND).into_response();
    }
    match state.board.get(&id).await {
        Some(allocation) => ApiResponse::ok(allocation).into_response(),
        None => error_response("no allocation yet", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Alerts ─────────────────────────────────────────────────────

/// GET /api/v1/alerts
pub async fn list_alerts(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.alerts.records().await)
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = fleet_metrics::render_prometheus(&state.board.list().await);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fleet_controller::{Alert, AlertSink, AllocationBoard, RecordingAlertSink};
    use fleet_core::FleetConfig;
    use fleet_metrics::SampleStore;

    const CONFIG: &str = r#"
[[services]]
id = "api"
critical = true
min_units = 2
max_units = 20
target = 70
scale_out_cooldown = "60s"
scale_in_cooldown = "60s"
bands = [{ lower = 0, delta = 1 }]
"#;

    fn test_state() -> ApiState {
        ApiState {
            config: Arc::new(FleetConfig::from_toml_str(CONFIG).unwrap()),
            samples: SampleStore::new(),
            board: AllocationBoard::new(),
            alerts: RecordingAlertSink::new(10),
        }
    }

    fn input(service: &str, value: f64) -> SampleInput {
        SampleInput {
            service_id: service.to_string(),
            metric: None,
            value,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn ingest_defaults_metric_and_timestamp() {
        let state = test_state();
        let resp = ingest_samples(State(state.clone()), Json(SampleBatch::One(input("api", 81.0))))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let latest = state.samples.latest().await;
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].metric, MetricKind::Cpu);
        assert_eq!(latest[0].value, 81.0);
    }

    #[tokio::test]
    async fn ingest_rejects_whole_batch_on_unknown_service() {
        let state = test_state();
        let batch = SampleBatch::Many(vec![input("api", 50.0), input("nope", 50.0)]);
        let resp = ingest_samples(State(state.clone()), Json(batch))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(state.samples.latest().await.is_empty());
    }

    #[tokio::test]
    async fn ingest_rejects_non_finite_values() {
        let state = test_state();
        let resp = ingest_samples(State(state), Json(SampleBatch::One(input("api", f64::NAN))))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn allocation_not_found_before_first_sync() {
        let state = test_state();
        let resp = get_allocation(State(state.clone()), Path("api".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        state
            .board
            .publish(CapacityAllocation {
                service_id: "api".to_string(),
                total_units: 4,
                guaranteed_units: 4,
                preemptible_units: 0,
            })
            .await;
        let resp = get_allocation(State(state), Path("api".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_service_allocation_is_not_found() {
        let state = test_state();
        let resp = get_allocation(State(state), Path("ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn alerts_endpoint_lists_records() {
        let state = test_state();
        state
            .alerts
            .notify(Alert::MetricsUnavailable {
                service: "api".to_string(),
                reason: "no data".to_string(),
            })
            .await;
        let resp = list_alerts(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn prometheus_endpoint_returns_text() {
        let state = test_state();
        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));
    }
}
