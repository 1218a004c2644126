use serde::Deserialize;
use std::time::Duration;

/// Default endpoint for random page summaries; `{lang}` is replaced by the language code
pub const DEFAULT_URL_TEMPLATE: &str = "https://{lang}.wikipedia.org/api/rest_v1/page/random/summary";

/// Highest request rate (req/s) the Wikipedia REST API allows
pub const MAX_RATE_LIMIT: f64 = 200.0;

/// Main configuration structure for Wiki-Ipsum
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub pipeline: PipelineConfig,
    pub backoff: BackoffConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Language code, e.g. "en"
    pub lang: String,

    /// User-Agent header; should say how to contact the operator
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Endpoint URL with a `{lang}` placeholder
    #[serde(rename = "url-template")]
    pub url_template: String,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,
}

/// Dispatch and aggregation configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Request rate in req/s; anything outside (0, 200] becomes 200
    pub rate: f64,

    /// Stop after writing this many bytes (0 = unbounded)
    #[serde(rename = "target-length")]
    pub target_length: usize,

    /// Maximum number of attempts in flight (0 = unbounded)
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: usize,

    /// Surface expected errors (throttling, timeouts) as well
    pub verbose: bool,
}

/// Exponential backoff applied to throttled attempts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First retry delay (milliseconds)
    #[serde(rename = "initial-interval")]
    pub initial_interval: u64,

    /// Growth factor applied to the delay after each retry
    pub multiplier: f64,

    /// Jitter: the delay is randomized within +/- this fraction
    #[serde(rename = "randomization-factor")]
    pub randomization_factor: f64,

    /// Ceiling for a single delay (milliseconds)
    #[serde(rename = "max-interval")]
    pub max_interval: u64,

    /// Give up retrying once an attempt has been running this long (milliseconds)
    #[serde(rename = "max-elapsed-time")]
    pub max_elapsed_time: u64,
}

impl ApiConfig {
    /// The endpoint URL for the configured language
    pub fn endpoint(&self) -> String {
        self.url_template.replace("{lang}", &self.lang)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}

impl BackoffConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval)
    }

    pub fn max_elapsed_time(&self) -> Duration {
        Duration::from_millis(self.max_elapsed_time)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            lang: String::new(),
            user_agent: String::new(),
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            request_timeout: 5_000,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rate: MAX_RATE_LIMIT,
            target_length: 0,
            max_in_flight: 0,
            verbose: false,
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_interval: 500,
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: 60_000,
            max_elapsed_time: 15 * 60 * 1000,
        }
    }
}
