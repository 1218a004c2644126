//! Summary fetcher implementation
//!
//! This module performs single requests against the random-summary endpoint
//! and classifies what came back:
//! - Building the HTTP client with the configured user agent and timeout
//! - One GET per invocation, aborted when the run is cancelled
//! - Mapping status, content type and body onto a [`FetchOutcome`]

use crate::config::ApiConfig;
use crate::{ConfigError, IpsumError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Text of one successfully fetched summary, surrounding whitespace trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    text: String,
}

impl FetchResult {
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            text: text.as_ref().trim().to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// How a failure should be treated by the retrier and the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The API rejected the request with 429; worth retrying later
    Throttled,
    /// Network timeout; the attempt already had its time
    Transient,
    /// Unexpected response; retrying would not help
    Fatal,
    /// The run was cancelled while the attempt was in flight
    Cancelled,
}

/// Reasons a single attempt did not produce a summary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("too many requests")]
    Throttled,

    #[error("request timed out")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("response status {status}")]
    BadStatus { status: u16 },

    #[error("response content type {content_type:?}")]
    BadContentType { content_type: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Throttled => ErrorKind::Throttled,
            FetchError::Timeout => ErrorKind::Transient,
            FetchError::Cancelled => ErrorKind::Cancelled,
            FetchError::BadStatus { .. }
            | FetchError::BadContentType { .. }
            | FetchError::Decode(_)
            | FetchError::Network(_) => ErrorKind::Fatal,
        }
    }
}

/// Terminal result of one fetch (or of one attempt, after retries)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(FetchResult),
    Retryable(FetchError),
    Fatal(FetchError),
    Cancelled(FetchError),
}

impl FetchOutcome {
    /// Splits the outcome into the summary or the error that replaced it
    pub fn into_result(self) -> Result<FetchResult, FetchError> {
        match self {
            FetchOutcome::Success(result) => Ok(result),
            FetchOutcome::Retryable(e) | FetchOutcome::Fatal(e) | FetchOutcome::Cancelled(e) => {
                Err(e)
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchOutcome::Retryable(_))
    }
}

impl From<FetchError> for FetchOutcome {
    fn from(error: FetchError) -> Self {
        match error.kind() {
            ErrorKind::Throttled => FetchOutcome::Retryable(error),
            ErrorKind::Transient | ErrorKind::Cancelled => FetchOutcome::Cancelled(error),
            ErrorKind::Fatal => FetchOutcome::Fatal(error),
        }
    }
}

/// Anything that can produce one summary per call
///
/// [`SummaryFetcher`] is the real implementation; the seam exists so the
/// retrier and dispatcher can be driven without a network.
#[async_trait]
pub trait SummarySource: Send + Sync {
    /// Performs exactly one fetch; never retries
    async fn fetch(&self, cancel: &CancellationToken) -> FetchOutcome;
}

/// Response shape of the random-summary endpoint (only the field we use)
#[derive(Debug, Deserialize)]
struct SummaryBody {
    extract: String,
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - Sent with every request; Wikipedia asks for contact details
/// * `timeout` - Upper bound for a whole request, independent of cancellation
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use wiki_ipsum::pipeline::build_http_client;
///
/// let client = build_http_client("admin@example.com", Duration::from_secs(5)).unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches random page summaries from one endpoint
#[derive(Debug, Clone)]
pub struct SummaryFetcher {
    client: Client,
    url: Url,
}

impl SummaryFetcher {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }

    /// Builds the client and endpoint URL from API configuration
    pub fn from_config(config: &ApiConfig) -> Result<Self, IpsumError> {
        let endpoint = config.endpoint();
        let url = Url::parse(&endpoint).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", endpoint, e))
        })?;
        let client = build_http_client(&config.user_agent, config.request_timeout())?;

        Ok(Self::new(client, url))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn request(&self) -> FetchOutcome {
        let response = match self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "application/problem+json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_error(&e).into(),
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        // Error bodies are never inspected, so don't wait for them
        let body = if status == StatusCode::OK {
            match response.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => return transport_error(&e).into(),
            }
        } else {
            Vec::new()
        };

        classify_response(status, content_type.as_deref(), &body)
    }
}

#[async_trait]
impl SummarySource for SummaryFetcher {
    async fn fetch(&self, cancel: &CancellationToken) -> FetchOutcome {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => FetchOutcome::Cancelled(FetchError::Cancelled),
            outcome = self.request() => outcome,
        }
    }
}

/// Classifies a complete response
///
/// | Condition | Outcome |
/// |-----------|---------|
/// | HTTP 429 | Retryable(Throttled) |
/// | Other non-200 | Fatal(BadStatus) |
/// | Media type not `application/json` | Fatal(BadContentType) |
/// | Body without a string `extract` | Fatal(Decode) |
/// | Otherwise | Success, extract trimmed |
///
/// The result depends on nothing but the arguments.
pub fn classify_response(
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> FetchOutcome {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return FetchOutcome::Retryable(FetchError::Throttled);
    }

    if status != StatusCode::OK {
        return FetchOutcome::Fatal(FetchError::BadStatus {
            status: status.as_u16(),
        });
    }

    let media_type = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if media_type != "application/json" {
        return FetchOutcome::Fatal(FetchError::BadContentType {
            content_type: content_type.unwrap_or_default().to_string(),
        });
    }

    match serde_json::from_slice::<SummaryBody>(body) {
        Ok(summary) => FetchOutcome::Success(FetchResult::new(summary.extract)),
        Err(e) => FetchOutcome::Fatal(FetchError::Decode(e.to_string())),
    }
}

fn transport_error(error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(error.to_string())
    }
}
