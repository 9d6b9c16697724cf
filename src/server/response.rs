//! JSON envelopes for the HTTP service

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::collector::{CollectError, ErrorKind};

/// Successful `/pictures` body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UrlsResponse {
    pub urls: Vec<String>,
}

/// Body of every error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// An error ready to be sent to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Error whose message is the status' canonical reason, e.g. "Not Found"
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, status.canonical_reason().unwrap_or("Error"))
    }
}

impl From<CollectError> for ApiError {
    fn from(err: CollectError) -> Self {
        let status = match err.kind {
            ErrorKind::InvalidRange => StatusCode::BAD_REQUEST,
            ErrorKind::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Transport | ErrorKind::Decode => StatusCode::BAD_GATEWAY,
            ErrorKind::Cancelled => StatusCode::NOT_FOUND,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::X_CONTENT_TYPE_OPTIONS, "nosniff")],
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
