use serde::Serialize;
use thiserror::Error;

/// Classification of everything that can go wrong while collecting a range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// `to` precedes `from`
    InvalidRange,

    /// Remote quota exhausted
    RateLimitExceeded,

    /// Network, timeout or unexpected HTTP status
    Transport,

    /// Response could not be understood
    Decode,

    /// Caller gave up; never surfaced as an error
    Cancelled,
}

impl ErrorKind {
    /// Whether a failure of this kind aborts the whole collection
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimitExceeded | ErrorKind::Transport | ErrorKind::Decode
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal error of one collection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CollectError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CollectError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRange, message)
    }
}
