use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::apod::PictureFetcher;
use crate::collector::aggregator::aggregate;
use crate::collector::cancel::StopSignal;
use crate::collector::error::{CollectError, ErrorKind};
use crate::collector::pool::FetchWorkerPool;
use crate::collector::range::{expand, into_tasks};
use crate::collector::task::DayKey;
use crate::utils::metrics::{CollectionStatus, MetricsCollector};

/// Collects one picture URL per day of a range.
///
/// Every call gets its own queue, workers and outcome channel; only the
/// fetcher and the metrics are shared between calls.
pub struct PictureCollector {
    pool: FetchWorkerPool,
    metrics: MetricsCollector,
}

impl PictureCollector {
    /// Create a collector running `workers` concurrent fetches per call
    pub fn new(fetcher: Arc<dyn PictureFetcher>, workers: usize, metrics: MetricsCollector) -> Self {
        Self {
            pool: FetchWorkerPool::new(workers, fetcher, metrics.clone()),
            metrics,
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn workers(&self) -> usize {
        self.pool.workers()
    }

    /// Fetch the picture URL of every day in `[from, to]`.
    ///
    /// URLs come back in calendar order. The first rate-limit, transport or
    /// decode failure aborts the collection and no URLs are returned. If
    /// `cancel` fires the result is an empty list.
    #[instrument(skip(self, cancel), fields(collection_id = %Uuid::new_v4()))]
    pub async fn collect(
        &self,
        from: DayKey,
        to: DayKey,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CollectError> {
        self.metrics.collection_started().await;

        let days = match expand(from, to) {
            Ok(days) => days,
            Err(e) => {
                self.metrics.collection_finished(CollectionStatus::Failed).await;
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            info!(kind = %ErrorKind::Cancelled, "Stopped before any fetch started");
            self.metrics.collection_finished(CollectionStatus::Cancelled).await;
            return Ok(Vec::new());
        }

        info!(days = days.len(), workers = self.pool.workers(), "Collecting pictures");

        let stop = StopSignal::new(cancel);
        let mut run = self.pool.spawn(into_tasks(&days), stop.clone());

        let result = aggregate(&days, &mut run.outcomes, &stop).await;

        // Workers still fetching after an abort exit at their next suspension point
        stop.fire();
        debug!(live = run.live_workers(), "Waiting for fetch workers");
        run.join().await;

        let status = match &result {
            Err(e) => {
                warn!(kind = %e.kind, "Collection failed: {}", e.message);
                CollectionStatus::Failed
            }
            Ok(_) if stop.is_cancelled_externally() => {
                info!(kind = %ErrorKind::Cancelled, "Collection stopped by caller");
                CollectionStatus::Cancelled
            }
            Ok(urls) => {
                info!(urls = urls.len(), "Collection completed");
                CollectionStatus::Succeeded
            }
        };
        self.metrics.collection_finished(status).await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apod::{FetchError, MockPictureFetcher};
    use crate::collector::pool::tests::InstrumentedFetcher;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn day(s: &str) -> DayKey {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_all_succeed_in_calendar_order_despite_completion_order() {
        let fetcher = Arc::new(
            InstrumentedFetcher::new(Duration::from_millis(1))
                .respond("2022-06-29", Ok("U0".into()))
                .respond("2022-06-30", Ok("U1".into()))
                .respond("2022-07-01", Ok("U2".into()))
                .delay("2022-06-29", Duration::from_millis(60))
                .delay("2022-06-30", Duration::from_millis(30)),
        );
        let collector = PictureCollector::new(fetcher, 5, MetricsCollector::new());

        let urls = assert_ok!(
            collector
                .collect(day("2022-06-29"), day("2022-07-01"), &CancellationToken::new())
                .await
        );
        assert_eq!(urls, vec!["U0", "U1", "U2"]);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces_no_urls() {
        let fetcher = Arc::new(
            InstrumentedFetcher::new(Duration::from_millis(1))
                .respond("2022-06-29", Ok("U0".into()))
                .respond("2022-06-30", Err(FetchError::Transport("connection reset".into())))
                .respond("2022-07-01", Ok("U2".into()))
                .delay("2022-06-30", Duration::from_millis(40)),
        );
        let metrics = MetricsCollector::new();
        let collector = PictureCollector::new(fetcher.clone(), 5, metrics.clone());

        let err = assert_err!(
            collector
                .collect(day("2022-06-29"), day("2022-07-01"), &CancellationToken::new())
                .await
        );
        assert_eq!(err.kind, ErrorKind::Transport);
        assert!(err.message.contains("connection reset"));

        // Both neighbours succeeded before the failure arrived and were still dropped
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        let snapshot = metrics.get_metrics().await;
        assert_eq!(snapshot.successful_fetches, 2);
        assert_eq!(snapshot.failed_fetches, 1);
        assert_eq!(snapshot.collections_failed, 1);
    }

    #[tokio::test]
    async fn test_rate_limit_stops_remaining_work() {
        let fetcher = Arc::new(
            InstrumentedFetcher::new(Duration::from_millis(20))
                .respond("2022-01-01", Err(FetchError::RateLimitExceeded("0 remaining".into())))
                .delay("2022-01-01", Duration::from_millis(1)),
        );
        let collector = PictureCollector::new(fetcher.clone(), 2, MetricsCollector::new());

        let err = collector
            .collect(day("2022-01-01"), day("2022-12-31"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::RateLimitExceeded);
        assert!(fetcher.calls.load(Ordering::SeqCst) < 10);
    }

    #[tokio::test]
    async fn test_invalid_range_issues_no_fetch() {
        let mut fetcher = MockPictureFetcher::new();
        fetcher.expect_fetch().times(0);
        let collector = PictureCollector::new(Arc::new(fetcher), 5, MetricsCollector::new());

        let err = collector
            .collect(day("2022-07-01"), day("2022-06-29"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidRange);
    }

    #[tokio::test]
    async fn test_pre_cancelled_returns_empty_without_fetching() {
        let mut fetcher = MockPictureFetcher::new();
        fetcher.expect_fetch().times(0);
        let metrics = MetricsCollector::new();
        let collector = PictureCollector::new(Arc::new(fetcher), 5, metrics.clone());

        let cancel = CancellationToken::new();
        cancel.cancel();

        let urls = collector
            .collect(day("2022-06-29"), day("2022-07-01"), &cancel)
            .await
            .unwrap();
        assert!(urls.is_empty());
        assert_eq!(metrics.get_metrics().await.collections_cancelled, 1);
    }

    #[tokio::test]
    async fn test_cancel_mid_flight_returns_empty() {
        let fetcher = Arc::new(InstrumentedFetcher::new(Duration::from_millis(40)));
        let collector = PictureCollector::new(fetcher.clone(), 2, MetricsCollector::new());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            trigger.cancel();
        });

        let urls = tokio::time::timeout(
            Duration::from_secs(2),
            collector.collect(day("2022-01-01"), day("2022-01-31"), &cancel),
        )
        .await
        .expect("collection should stop promptly")
        .unwrap();

        assert!(urls.is_empty());
        assert!(fetcher.calls.load(Ordering::SeqCst) < 31);
    }

    #[tokio::test]
    async fn test_single_day_uses_mock_fetcher() {
        let mut fetcher = MockPictureFetcher::new();
        fetcher
            .expect_fetch()
            .withf(|d| d.to_string() == "2022-07-01")
            .times(1)
            .returning(|_| Ok("https://apod.nasa.gov/apod/image/2207/Star-trail-of-planets1067.jpg".to_string()));
        let collector = PictureCollector::new(Arc::new(fetcher), 5, MetricsCollector::new());

        let urls = collector
            .collect(day("2022-07-01"), day("2022-07-01"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(
            urls,
            vec!["https://apod.nasa.gov/apod/image/2207/Star-trail-of-planets1067.jpg"]
        );
    }
}
