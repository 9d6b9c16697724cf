use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::collector::cancel::StopSignal;
use crate::collector::error::{CollectError, ErrorKind};
use crate::collector::task::{DayKey, FetchOutcome};

/// Places each URL at its day's offset and remembers the first fatal failure
#[derive(Debug)]
pub struct ResultAggregator {
    /// Requested days, in range order
    days: Vec<DayKey>,

    /// One slot per day
    slots: Vec<Option<String>>,

    /// First fatal failure seen; later ones are ignored
    first_failure: Option<CollectError>,
}

/// What the caller should do after recording an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Abort,
}

impl ResultAggregator {
    pub fn new(days: &[DayKey]) -> Self {
        Self {
            days: days.to_vec(),
            slots: vec![None; days.len()],
            first_failure: None,
        }
    }

    /// Record one outcome
    pub fn record(&mut self, outcome: FetchOutcome) -> Verdict {
        if self.first_failure.is_some() {
            return Verdict::Abort;
        }

        match outcome {
            FetchOutcome::Success { task, url } => {
                match self.slots.get_mut(task.index) {
                    Some(slot) => *slot = Some(url),
                    None => warn!(index = task.index, day = %task.day, "Outcome outside of requested range"),
                }
                Verdict::Continue
            }
            FetchOutcome::Failure { task, kind, message } if kind.is_fatal() => {
                debug!(day = %task.day, %kind, "Fatal failure, aborting collection");
                self.first_failure = Some(CollectError::new(kind, message));
                Verdict::Abort
            }
            FetchOutcome::Failure { task, kind, message } => {
                debug!(day = %task.day, %kind, "Ignoring non-fatal failure: {}", message);
                Verdict::Continue
            }
        }
    }

    /// Number of days that already have a URL
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Produce the final result.
    ///
    /// A fatal failure wins over everything. A cancelled collection yields no
    /// URLs. Otherwise every day must have a URL.
    pub fn finish(self, cancelled: bool) -> Result<Vec<String>, CollectError> {
        if let Some(failure) = self.first_failure {
            return Err(failure);
        }

        if cancelled {
            return Ok(Vec::new());
        }

        let mut urls = Vec::with_capacity(self.slots.len());
        for (day, slot) in self.days.iter().zip(self.slots) {
            match slot {
                Some(url) => urls.push(url),
                None => {
                    return Err(CollectError::new(
                        ErrorKind::Transport,
                        format!("no outcome reported for {}", day),
                    ))
                }
            }
        }

        Ok(urls)
    }
}

/// Drain the pool's outcomes, stopping the pool on the first fatal failure
pub async fn aggregate(
    days: &[DayKey],
    outcomes: &mut mpsc::Receiver<FetchOutcome>,
    stop: &StopSignal,
) -> Result<Vec<String>, CollectError> {
    let mut aggregator = ResultAggregator::new(days);

    while let Some(outcome) = outcomes.recv().await {
        if aggregator.record(outcome) == Verdict::Abort {
            stop.fire();
            break;
        }
    }

    debug!(filled = aggregator.filled(), total = days.len(), "Outcome stream ended");

    aggregator.finish(stop.is_cancelled_externally())
}
