//! Daemon wiring: config → controller + API, with graceful shutdown.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fleet_api::ApiState;
use fleet_controller::{
    AlertSink, Controller, FanoutAlertSink, RecordingAlertSink, SimulatedExecutor,
    TracingAlertSink,
};
use fleet_core::FleetConfig;
use fleet_metrics::SampleStore;
use tokio::sync::watch;
use tracing::{error, info};

/// Alerts kept in memory for `GET /api/v1/alerts`.
const ALERT_HISTORY: usize = 256;

pub async fn run(config_path: &Path, port: u16) -> anyhow::Result<()> {
    info!("fleet daemon starting");

    let config = FleetConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let config = Arc::new(config);

    // ── Subsystems ─────────────────────────────────────────────

    let samples = SampleStore::new().with_stale_after(config.controller.sample_max_age);
    info!(
        max_age_secs = config.controller.sample_max_age.as_secs(),
        "sample store ready"
    );
    let executor = SimulatedExecutor::from_config(&config);
    info!(services = config.services.len(), "simulated executor seeded");

    let recorded = RecordingAlertSink::new(ALERT_HISTORY);
    let alerts: Arc<dyn AlertSink> = Arc::new(
        FanoutAlertSink::new()
            .with(Arc::new(TracingAlertSink))
            .with(Arc::new(recorded.clone())),
    );

    let controller = Controller::new(
        config.clone(),
        Arc::new(samples.clone()),
        Arc::new(executor),
        alerts,
    );
    let board = controller.board();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controller_handle = tokio::spawn(controller.run(shutdown_rx));

    // ── API server ─────────────────────────────────────────────

    let router = fleet_api::build_router(ApiState {
        config,
        samples,
        board,
        alerts: recorded,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "API server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
    server.await?;

    // In-flight applies finish (or time out) before workers exit.
    if let Err(e) = controller_handle.await {
        error!(error = %e, "controller task failed");
    }

    info!("fleet daemon stopped");
    Ok(())
}
