//! Configuration module for Wiki-Ipsum
//!
//! This module handles loading the optional TOML configuration file, parsing
//! size strings, clamping the request rate and validating the merged result
//! before it reaches the pipeline.
//!
//! # Example
//!
//! ```no_run
//! use wiki_ipsum::config::{finalize, load_config};
//! use std::path::Path;
//!
//! let mut config = load_config(Path::new("wiki-ipsum.toml")).unwrap();
//! config.api.lang = "en".to_string();
//! let config = finalize(config).unwrap();
//! println!("Requesting at most {} summaries per second", config.pipeline.rate);
//! ```

mod parser;
mod size;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, BackoffConfig, Config, PipelineConfig, DEFAULT_URL_TEMPLATE, MAX_RATE_LIMIT,
};

pub use parser::{load_config, parse_config};
pub use size::parse_size;
pub use validation::{clamp_rate, finalize, validate};
