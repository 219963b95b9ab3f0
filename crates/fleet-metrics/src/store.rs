//! In-memory sample store.
//!
//! Keeps a bounded history per (service, metric) series. Samples pushed
//! out of order are inserted at their timestamp position so queries are
//! always oldest-first. Samples older than the staleness bound are never
//! returned, so a dead exporter reads as `NoData`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use fleet_core::{MetricKind, MetricSample};

use crate::source::{MetricResult, MetricSource, SampleWindow};

const DEFAULT_HISTORY: usize = 60;
const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(300);

type SeriesKey = (String, MetricKind);

/// Bounded, shareable sample history.
#[derive(Clone)]
pub struct SampleStore {
    series: Arc<RwLock<HashMap<SeriesKey, VecDeque<MetricSample>>>>,
    history: usize,
    /// Samples older than this are not returned.
    stale_after: Duration,
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore {
    pub fn new() -> Self {
        Self {
            series: Arc::new(RwLock::new(HashMap::new())),
            history: DEFAULT_HISTORY,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Keep at most `history` samples per series.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Ignore samples older than `age` when answering queries.
    pub fn with_stale_after(mut self, age: Duration) -> Self {
        self.stale_after = age;
        self
    }

    /// Record one sample.
    pub async fn record(&self, sample: MetricSample) {
        let key = (sample.service_id.clone(), sample.metric);
        let mut series = self.series.write().await;
        let buf = series.entry(key).or_default();

        let pos = buf.partition_point(|s| s.timestamp <= sample.timestamp);
        buf.insert(pos, sample);
        while buf.len() > self.history {
            buf.pop_front();
        }
    }

    pub async fn record_all(&self, samples: impl IntoIterator<Item = MetricSample>) {
        for sample in samples {
            self.record(sample).await;
        }
    }

    /// Drop all samples for a series (e.g. when an exporter goes away).
    pub async fn clear(&self, service_id: &str, metric: MetricKind) {
        let mut series = self.series.write().await;
        if series.remove(&(service_id.to_string(), metric)).is_some() {
            debug!(service = %service_id, %metric, "sample series cleared");
        }
    }

    /// Query as of an explicit instant.
    pub async fn samples_at(
        &self,
        service_id: &str,
        metric: MetricKind,
        lookback: usize,
        now: DateTime<Utc>,
    ) -> SampleWindow {
        let series = self.series.read().await;
        let Some(buf) = series.get(&(service_id.to_string(), metric)) else {
            return SampleWindow::NoData;
        };

        let fresh: Vec<MetricSample> = buf
            .iter()
            .filter(|s| match (now - s.timestamp).to_std() {
                Ok(age) => age <= self.stale_after,
                // Timestamped ahead of `now`.
                Err(_) => true,
            })
            .cloned()
            .collect();

        let skip = fresh.len().saturating_sub(lookback);
        SampleWindow::from_samples(fresh.into_iter().skip(skip).collect())
    }

    /// Latest sample per series, for API listings.
    pub async fn latest(&self) -> Vec<MetricSample> {
        let series = self.series.read().await;
        let mut out: Vec<MetricSample> = series.values().filter_map(|b| b.back().cloned()).collect();
        out.sort_by(|a, b| {
            a.service_id
                .cmp(&b.service_id)
                .then(a.metric.as_str().cmp(b.metric.as_str()))
        });
        out
    }
}

#[async_trait]
impl MetricSource for SampleStore {
    async fn samples(
        &self,
        service_id: &str,
        metric: MetricKind,
        lookback: usize,
        now: DateTime<Utc>,
    ) -> MetricResult<SampleWindow> {
        Ok(self.samples_at(service_id, metric, lookback, now).await)
    }
}
