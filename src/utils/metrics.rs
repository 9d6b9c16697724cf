use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::collector::error::ErrorKind;

/// Fetch and collection metrics shared by every pool in the process
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    /// In-memory metrics store
    metrics: Arc<Mutex<Metrics>>,
}

/// Metrics data structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Metrics {
    /// Start time of the metrics collection
    pub start_time: DateTime<Utc>,

    /// Remote fetches issued
    pub total_fetches: usize,

    /// Fetches that returned a URL
    pub successful_fetches: usize,

    /// Fetches that returned an error
    pub failed_fetches: usize,

    /// Failure counts keyed by error kind
    pub failures_by_kind: HashMap<String, usize>,

    /// Fetches currently awaiting the remote API
    pub in_flight: usize,

    /// Highest number of simultaneous fetches observed
    pub peak_in_flight: usize,

    /// Sum of completed fetch durations in milliseconds
    pub total_fetch_ms: u64,

    /// Mean completed fetch duration in milliseconds
    pub average_fetch_ms: f64,

    /// Collections started
    pub collections_started: usize,

    /// Collections that returned URLs
    pub collections_succeeded: usize,

    /// Collections that ended with an error
    pub collections_failed: usize,

    /// Collections stopped by their caller
    pub collections_cancelled: usize,
}

/// How a collection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Succeeded,
    Failed,
    Cancelled,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        let metrics = Metrics {
            start_time: Utc::now(),
            ..Default::default()
        };

        Self {
            metrics: Arc::new(Mutex::new(metrics)),
        }
    }

    /// Record a fetch leaving for the remote API
    pub async fn fetch_started(&self) {
        let mut metrics = self.metrics.lock().await;

        metrics.total_fetches += 1;
        metrics.in_flight += 1;
        metrics.peak_in_flight = metrics.peak_in_flight.max(metrics.in_flight);
    }

    /// Record a fetch coming back; `failure` is `None` on success
    pub async fn fetch_finished(&self, failure: Option<ErrorKind>, duration_ms: u64) {
        let mut metrics = self.metrics.lock().await;

        metrics.in_flight = metrics.in_flight.saturating_sub(1);

        match failure {
            None => metrics.successful_fetches += 1,
            Some(kind) => {
                metrics.failed_fetches += 1;
                *metrics.failures_by_kind.entry(kind.to_string()).or_default() += 1;
            }
        }

        metrics.total_fetch_ms += duration_ms;
        let completed = metrics.successful_fetches + metrics.failed_fetches;
        metrics.average_fetch_ms = metrics.total_fetch_ms as f64 / completed as f64;
    }

    /// Record a fetch abandoned by a stop signal before it returned
    pub async fn fetch_abandoned(&self) {
        let mut metrics = self.metrics.lock().await;
        metrics.in_flight = metrics.in_flight.saturating_sub(1);
    }

    /// Record the start of a collection
    pub async fn collection_started(&self) {
        self.metrics.lock().await.collections_started += 1;
    }

    /// Record how a collection ended
    pub async fn collection_finished(&self, status: CollectionStatus) {
        let mut metrics = self.metrics.lock().await;

        match status {
            CollectionStatus::Succeeded => metrics.collections_succeeded += 1,
            CollectionStatus::Failed => metrics.collections_failed += 1,
            CollectionStatus::Cancelled => metrics.collections_cancelled += 1,
        }
    }

    /// Start timing a request
    pub fn start_timer(&self) -> RequestTimer {
        RequestTimer {
            start: Instant::now(),
        }
    }

    /// Get all metrics
    pub async fn get_metrics(&self) -> Metrics {
        self.metrics.lock().await.clone()
    }
}

/// Request timer for measuring request durations
pub struct RequestTimer {
    /// Start time of the request
    start: Instant,
}

impl RequestTimer {
    /// End timing and get the duration in milliseconds
    pub fn end(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_counters() {
        let collector = MetricsCollector::new();

        collector.fetch_started().await;
        collector.fetch_started().await;
        collector.fetch_finished(None, 10).await;
        collector.fetch_started().await;
        collector.fetch_finished(Some(ErrorKind::Transport), 30).await;
        collector.fetch_abandoned().await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.total_fetches, 3);
        assert_eq!(metrics.successful_fetches, 1);
        assert_eq!(metrics.failed_fetches, 1);
        assert_eq!(metrics.failures_by_kind.get("transport"), Some(&1));
        assert_eq!(metrics.in_flight, 0);
        assert_eq!(metrics.peak_in_flight, 2);
        assert_eq!(metrics.average_fetch_ms, 20.0);
    }

    #[tokio::test]
    async fn test_collection_counters() {
        let collector = MetricsCollector::new();

        collector.collection_started().await;
        collector.collection_finished(CollectionStatus::Cancelled).await;

        let metrics = collector.get_metrics().await;
        assert_eq!(metrics.collections_started, 1);
        assert_eq!(metrics.collections_cancelled, 1);
        assert_eq!(metrics.collections_failed, 0);
    }
}
