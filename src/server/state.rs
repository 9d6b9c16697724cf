use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::collector::PictureCollector;

/// State shared by every route handler
#[derive(Clone)]
pub struct AppState {
    /// Orchestrates the per-day fetches
    pub collector: Arc<PictureCollector>,

    /// Parent of every request's cancellation token
    pub requests: CancellationToken,

    /// Upper bound for one `/pictures` request
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(collector: Arc<PictureCollector>, requests: CancellationToken, request_timeout: Duration) -> Self {
        Self {
            collector,
            requests,
            request_timeout,
        }
    }
}
