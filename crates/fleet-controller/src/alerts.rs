//! Alerting sinks.
//!
//! Alerts are the controller's only user-facing signal. Sinks must not
//! fail the tick that raised them, so `notify` has no error channel.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::warn;

/// A notification raised by a service worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    /// The executor rejected an allocation or timed out.
    ApplyFailed {
        service: String,
        units: u32,
        error: String,
    },
    /// An applied allocation reached the effective maximum.
    NearCapacity {
        service: String,
        units: u32,
        max_units: u32,
    },
    /// A change was applied under an override that skips cooldowns.
    CooldownBypassed {
        service: String,
        override_name: String,
        from: u32,
        to: u32,
    },
    /// The metric source stopped returning data for a service.
    MetricsUnavailable { service: String, reason: String },
}

impl Alert {
    pub fn service(&self) -> &str {
        match self {
            Alert::ApplyFailed { service, .. }
            | Alert::NearCapacity { service, .. }
            | Alert::CooldownBypassed { service, .. }
            | Alert::MetricsUnavailable { service, .. } => service,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Alert::ApplyFailed { .. } => "apply_failed",
            Alert::NearCapacity { .. } => "near_capacity",
            Alert::CooldownBypassed { .. } => "cooldown_bypassed",
            Alert::MetricsUnavailable { .. } => "metrics_unavailable",
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, alert: Alert);
}

/// Writes every alert to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

#[async_trait]
impl AlertSink for TracingAlertSink {
    async fn notify(&self, alert: Alert) {
        warn!(service = %alert.service(), kind = alert.kind(), ?alert, "alert");
    }
}

/// An alert with the time it was raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertRecord {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub alert: Alert,
}

/// Keeps the most recent alerts in memory.
#[derive(Clone)]
pub struct RecordingAlertSink {
    records: Arc<RwLock<VecDeque<AlertRecord>>>,
    capacity: usize,
}

impl RecordingAlertSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Recorded alerts, oldest first.
    pub async fn records(&self) -> Vec<AlertRecord> {
        self.records.read().await.iter().cloned().collect()
    }

    pub async fn alerts(&self) -> Vec<Alert> {
        self.records
            .read()
            .await
            .iter()
            .map(|r| r.alert.clone())
            .collect()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, alert: Alert) {
        let mut records = self.records.write().await;
        records.push_back(AlertRecord {
            at: Utc::now(),
            alert,
        });
        while records.len() > self.capacity {
            records.pop_front();
        }
    }
}

/// Delivers each alert to every inner sink, in order.
#[derive(Clone, Default)]
pub struct FanoutAlertSink {
    sinks: Vec<Arc<dyn AlertSink>>,
}

impl FanoutAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl AlertSink for FanoutAlertSink {
    async fn notify(&self, alert: Alert) {
        for sink in &self.sinks {
            sink.notify(alert.clone()).await;
        }
    }
}
