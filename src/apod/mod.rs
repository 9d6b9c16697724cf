pub mod client;

use async_trait::async_trait;
use thiserror::Error;

use crate::collector::error::ErrorKind;
use crate::collector::task::DayKey;

pub use client::ApodClient;

/// Failure of a single picture lookup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Remote quota exhausted
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The request did not complete
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with something other than 200
    #[error("unexpected status {status} for {day}")]
    Status { status: u16, day: DayKey },

    /// The response could not be understood
    #[error("invalid response: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::RateLimitExceeded(_) => ErrorKind::RateLimitExceeded,
            FetchError::Transport(_) | FetchError::Status { .. } => ErrorKind::Transport,
            FetchError::Decode(_) => ErrorKind::Decode,
        }
    }
}

/// Source of one picture URL per day
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PictureFetcher: Send + Sync {
    /// Look up the picture URL published for `day`
    async fn fetch(&self, day: DayKey) -> Result<String, FetchError>;
}
