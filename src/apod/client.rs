use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::apod::{FetchError, PictureFetcher};
use crate::cli::config::ApodSettings;
use crate::collector::task::DayKey;

/// Header carrying the remaining request quota
pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";

/// One Astronomy Picture of the Day entry; fields the collector never reads are skipped
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApodPayload {
    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// "image" or "video"
    #[serde(default)]
    pub media_type: Option<String>,

    /// The picture URL returned to callers
    pub url: String,
}

/// HTTP client for the APOD API
#[derive(Debug, Clone)]
pub struct ApodClient {
    /// Underlying HTTP client, shared by every fetch
    client: Client,

    /// API endpoint
    base_url: Url,

    /// Credential appended to every request
    api_key: String,
}

impl ApodClient {
    /// Create a new client from the APOD settings
    pub fn new(settings: &ApodSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url)
            .context(format!("Invalid APOD base URL: {}", settings.base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key.clone(),
        })
    }

    /// Build the request URL for a day
    fn request_url(&self, day: DayKey) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("api_key", &self.api_key)
            .append_pair("date", &day.to_string());
        url
    }
}

#[async_trait]
impl PictureFetcher for ApodClient {
    async fn fetch(&self, day: DayKey) -> Result<String, FetchError> {
        debug!(%day, "Requesting APOD entry");

        // reqwest errors carry the URL, which carries the API key
        let response = self
            .client
            .get(self.request_url(day))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimitExceeded(format!(
                "remote answered {} for {}",
                status, day
            )));
        }
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
                day,
            });
        }

        let remaining = response
            .headers()
            .get(RATE_LIMIT_REMAINING)
            .ok_or_else(|| FetchError::Decode(format!("missing {} header", RATE_LIMIT_REMAINING)))?
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or_else(|| FetchError::Decode(format!("unreadable {} header", RATE_LIMIT_REMAINING)))?;

        if remaining < 1 {
            return Err(FetchError::RateLimitExceeded(format!(
                "{} is {}",
                RATE_LIMIT_REMAINING, remaining
            )));
        }

        let payload: ApodPayload = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.without_url().to_string()))?;

        if payload.url.is_empty() {
            return Err(FetchError::Decode(format!("no picture URL for {}", day)));
        }

        debug!(
            %day,
            remaining,
            published = ?payload.date,
            title = ?payload.title,
            media_type = ?payload.media_type,
            "Received APOD entry"
        );

        Ok(payload.url)
    }
}
