//! Wiki-Ipsum: placeholder text from random Wikipedia summaries
//!
//! This crate continuously fetches random page summaries from the Wikipedia
//! REST API at a bounded request rate and streams the extracts to an output
//! sink until a target length is reached or the run is stopped.

pub mod config;
pub mod output;
pub mod pipeline;

use thiserror::Error;

/// Main error type for Wiki-Ipsum operations
#[derive(Debug, Error)]
pub enum IpsumError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid size '{0}': expected e.g. '500', '100 bytes', '1.5 Kb' or '2 MB'")]
    InvalidSize(String),
}

/// Result type alias for Wiki-Ipsum operations
pub type Result<T> = std::result::Result<T, IpsumError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use output::RunSummary;
pub use pipeline::{Coordinator, FetchOutcome, FetchResult, StopHandle, SummaryFetcher};
