//! The metric source interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::{MetricKind, MetricSample};
use thiserror::Error;

pub type MetricResult<T> = Result<T, MetricError>;

#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metric backend unavailable: {0}")]
    Unavailable(String),

    #[error("metric query failed for {service}/{metric}: {reason}")]
    Query {
        service: String,
        metric: MetricKind,
        reason: String,
    },
}

/// Result of a sample query.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleWindow {
    /// Most recent samples, oldest first. Never empty.
    Samples(Vec<MetricSample>),
    /// The source has nothing current for this series.
    NoData,
}

impl SampleWindow {
    pub fn from_samples(samples: Vec<MetricSample>) -> Self {
        if samples.is_empty() {
            SampleWindow::NoData
        } else {
            SampleWindow::Samples(samples)
        }
    }

    pub fn samples(&self) -> &[MetricSample] {
        match self {
            SampleWindow::Samples(s) => s,
            SampleWindow::NoData => &[],
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, SampleWindow::NoData)
    }
}

/// Supplies periodic utilization samples per managed service.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Up to `lookback` most recent samples of `metric` for `service_id`
    /// that are still current at `now`. Samples too old to describe the
    /// service at `now` must yield `NoData`, never a stale window.
    async fn samples(
        &self,
        service_id: &str,
        metric: MetricKind,
        lookback: usize,
        now: DateTime<Utc>,
    ) -> MetricResult<SampleWindow>;
}
