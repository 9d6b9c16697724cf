use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::apod::PictureFetcher;
use crate::collector::cancel::StopSignal;
use crate::collector::task::{FetchOutcome, FetchTask};
use crate::utils::metrics::MetricsCollector;

/// Default number of concurrent fetches
pub const DEFAULT_WORKERS: usize = 5;

/// Fixed-width pool of fetch workers sharing one task queue
pub struct FetchWorkerPool {
    /// Number of workers started per run
    workers: usize,

    /// Remote picture source
    fetcher: Arc<dyn PictureFetcher>,

    /// Process-wide fetch metrics
    metrics: MetricsCollector,
}

/// A pool run in progress
pub struct PoolRun {
    /// Outcomes published by the workers; closes once every worker exited
    pub outcomes: mpsc::Receiver<FetchOutcome>,

    /// Worker task handles
    handles: Vec<JoinHandle<()>>,

    /// Workers that have not exited yet
    live: Arc<AtomicUsize>,
}

/// Everything one worker needs, moved into its task
struct Worker {
    id: usize,
    queue: Arc<Mutex<VecDeque<FetchTask>>>,
    outcomes: mpsc::Sender<FetchOutcome>,
    fetcher: Arc<dyn PictureFetcher>,
    stop: StopSignal,
    metrics: MetricsCollector,
    live: Arc<AtomicUsize>,
}

impl FetchWorkerPool {
    /// Create a pool of `workers` workers (at least one)
    pub fn new(workers: usize, fetcher: Arc<dyn PictureFetcher>, metrics: MetricsCollector) -> Self {
        Self {
            workers: workers.max(1),
            fetcher,
            metrics,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue every task and start the workers
    pub fn spawn(&self, tasks: Vec<FetchTask>, stop: StopSignal) -> PoolRun {
        debug!(workers = self.workers, tasks = tasks.len(), "Starting fetch workers");

        let queue = Arc::new(Mutex::new(VecDeque::from(tasks)));
        let (tx, rx) = mpsc::channel(self.workers);
        let live = Arc::new(AtomicUsize::new(self.workers));

        let handles = (0..self.workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    queue: queue.clone(),
                    outcomes: tx.clone(),
                    fetcher: self.fetcher.clone(),
                    stop: stop.clone(),
                    metrics: self.metrics.clone(),
                    live: live.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        PoolRun {
            outcomes: rx,
            handles,
            live,
        }
    }

    /// Run every task to completion (or until stopped) and return the outcomes
    /// in the order they were published
    pub async fn run(&self, tasks: Vec<FetchTask>, stop: StopSignal) -> Vec<FetchOutcome> {
        let mut run = self.spawn(tasks, stop);
        let mut outcomes = Vec::new();

        while let Some(outcome) = run.outcomes.recv().await {
            outcomes.push(outcome);
        }

        run.join().await;
        outcomes
    }
}

impl PoolRun {
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Wait for every worker to exit
    pub async fn join(self) {
        drop(self.outcomes);

        for result in join_all(self.handles).await {
            if let Err(e) = result {
                error!("Fetch worker terminated abnormally: {}", e);
            }
        }
    }
}

impl Worker {
    async fn run(self) {
        let Worker {
            id,
            queue,
            outcomes,
            fetcher,
            stop,
            metrics,
            live,
        } = self;

        debug!(worker = id, "Worker started");

        loop {
            let task = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                task = async { queue.lock().await.pop_front() } => match task {
                    Some(task) => task,
                    None => break,
                },
            };

            debug!(worker = id, day = %task.day, "Fetching picture");

            metrics.fetch_started().await;
            let timer = metrics.start_timer();

            let result = tokio::select! {
                biased;
                _ = stop.stopped() => {
                    metrics.fetch_abandoned().await;
                    debug!(worker = id, day = %task.day, "Abandoned in-flight fetch");
                    break;
                }
                result = fetcher.fetch(task.day) => result,
            };

            let outcome = match result {
                Ok(url) => {
                    metrics.fetch_finished(None, timer.end()).await;
                    FetchOutcome::Success { task, url }
                }
                Err(e) => {
                    let kind = e.kind();
                    metrics.fetch_finished(Some(kind), timer.end()).await;
                    warn!(worker = id, day = %task.day, %kind, "Fetch failed: {}", e);
                    FetchOutcome::Failure {
                        task,
                        kind,
                        message: e.to_string(),
                    }
                }
            };

            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                sent = outcomes.send(outcome) => {
                    if sent.is_err() {
                        debug!(worker = id, "Outcome receiver dropped");
                        break;
                    }
                }
            }
        }

        live.fetch_sub(1, Ordering::SeqCst);
        debug!(worker = id, "Worker exited");
    }
}
