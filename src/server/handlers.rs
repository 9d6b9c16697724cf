use std::time::Duration;

use axum::{
    extract::{RawQuery, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::collector::DayKey;
use crate::server::response::{ApiError, UrlsResponse};
use crate::server::state::AppState;

/// Query string of `GET /pictures`
#[derive(Debug, Default)]
pub struct PictureQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl PictureQuery {
    /// Decode a raw query string, keeping the first value of each parameter.
    ///
    /// Invalid UTF-8 in an escape decodes to U+FFFD and is rejected later as
    /// a malformed date.
    pub fn from_raw(raw: Option<&str>) -> Self {
        let mut query = Self::default();

        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "from" => &mut query.from,
                "to" => &mut query.to,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        query
    }
}

/// Parse one required date parameter
fn parse_param(name: &str, value: Option<&str>) -> Result<DayKey, ApiError> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        _ => return Err(ApiError::bad_request(format!("'{}' has to be provided", name))),
    };

    value.parse().map_err(|e| {
        ApiError::bad_request(format!("'{}' argument format not correct\n{}", name, e))
    })
}

/// Validate the query and return the requested range
pub fn parse_range(query: &PictureQuery) -> Result<(DayKey, DayKey), ApiError> {
    let from = parse_param("from", query.from.as_deref())?;
    let to = parse_param("to", query.to.as_deref())?;

    if from > to {
        return Err(ApiError::bad_request("'to' cannot be earlier than 'from'"));
    }

    Ok((from, to))
}

/// Cancel `cancel` once `timeout` elapses; the task ends early if `cancel` fires first
fn spawn_deadline(cancel: CancellationToken, timeout: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                debug!(?timeout, "Request timed out");
                cancel.cancel();
            }
        }
    })
}

/// `GET /pictures?from=YYYY-MM-DD&to=YYYY-MM-DD`
pub async fn get_pictures(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    let query = PictureQuery::from_raw(raw.as_deref());
    let (from, to) = match parse_range(&query) {
        Ok(range) => range,
        Err(e) => return e.into_response(),
    };

    // Cancelled when the client goes away (the handler future is dropped),
    // when the timeout fires, or when the server gives up on draining
    let cancel = state.requests.child_token();
    let _disconnect = cancel.clone().drop_guard();
    let deadline = spawn_deadline(cancel.clone(), state.request_timeout);

    let result = state.collector.collect(from, to, &cancel).await;
    deadline.abort();

    match result {
        Ok(urls) if urls.is_empty() => {
            info!(%from, %to, "No pictures collected");
            ApiError::from_status(StatusCode::NOT_FOUND).into_response()
        }
        Ok(urls) => (StatusCode::OK, Json(UrlsResponse { urls })).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Any other method on `/pictures`
pub async fn method_not_allowed() -> Response {
    ApiError::from_status(StatusCode::METHOD_NOT_ALLOWED).into_response()
}

/// `GET /health`
pub async fn health_check() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// `GET /metrics`
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    Json(state.collector.metrics().get_metrics().await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(from: Option<&str>, to: Option<&str>) -> PictureQuery {
        PictureQuery {
            from: from.map(String::from),
            to: to.map(String::from),
        }
    }

    #[test]
    fn test_parse_range_accepts_valid_dates() {
        let (from, to) = parse_range(&query(Some("2022-06-29"), Some("2022-07-01"))).unwrap();
        assert_eq!(from.to_string(), "2022-06-29");
        assert_eq!(to.to_string(), "2022-07-01");
    }

    #[test]
    fn test_from_raw_keeps_first_value() {
        let query = PictureQuery::from_raw(Some("from=2022-06-29&from=2022-06-30&to=2022-07-01&x=1"));
        assert_eq!(query.from.as_deref(), Some("2022-06-29"));
        assert_eq!(query.to.as_deref(), Some("2022-07-01"));

        let query = PictureQuery::from_raw(None);
        assert!(query.from.is_none() && query.to.is_none());
    }

    #[test]
    fn test_from_raw_invalid_utf8_is_malformed_date() {
        let query = PictureQuery::from_raw(Some("from=%FF&to=2022-07-01"));
        let err = parse_range(&query).unwrap_err();
        assert!(err.message.starts_with("'from' argument format not correct"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_deadline_ends_when_request_cancelled() {
        let cancel = CancellationToken::new();
        let deadline = spawn_deadline(cancel.clone(), Duration::from_secs(60));

        // Dropping the guard is what a client disconnect does
        drop(cancel.clone().drop_guard());

        tokio::time::timeout(Duration::from_secs(1), deadline)
            .await
            .expect("deadline task should end with its request")
            .unwrap();
    }

    #[tokio::test]
    async fn test_deadline_cancels_after_timeout() {
        let cancel = CancellationToken::new();
        spawn_deadline(cancel.clone(), Duration::from_millis(10)).await.unwrap();
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_parse_range_messages() {
        let cases = [
            (None, Some("2022-07-01"), "'from' has to be provided"),
            (Some(""), Some("2022-07-01"), "'from' has to be provided"),
            (Some("2022"), Some("2022-07-01"), "'from' argument format not correct"),
            (Some("2022-06-29"), None, "'to' has to be provided"),
            (Some("2022-06-29"), Some("2022"), "'to' argument format not correct"),
            (Some("2022-07-01"), Some("2022-06-29"), "'to' cannot be earlier than 'from'"),
        ];

        for (from, to, expected) in cases {
            let err = parse_range(&query(from, to)).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert!(err.message.starts_with(expected), "{:?} -> {}", (from, to), err.message);
        }
    }
}
