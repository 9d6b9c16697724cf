use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stop signal for one collection.
///
/// Derived from the caller's token: cancelling the caller's token stops the
/// pool, but a fatal failure stopping the pool never cancels the caller.
/// Once stopped it stays stopped.
#[derive(Debug, Clone)]
pub struct StopSignal {
    /// Token supplied by the caller (request lifetime, shutdown, Ctrl+C)
    external: CancellationToken,

    /// Token the workers observe
    stop: CancellationToken,
}

impl StopSignal {
    pub fn new(external: &CancellationToken) -> Self {
        Self {
            external: external.clone(),
            stop: external.child_token(),
        }
    }

    /// Stop every worker; repeated calls are no-ops
    pub fn fire(&self) {
        if !self.is_stopped() {
            debug!("Stop signal fired");
        }
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Whether the stop originated from the caller rather than a failure
    pub fn is_cancelled_externally(&self) -> bool {
        self.external.is_cancelled()
    }

    /// Resolves once the signal has fired
    pub async fn stopped(&self) {
        self.stop.cancelled().await
    }
}
