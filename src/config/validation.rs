use crate::config::types::{ApiConfig, BackoffConfig, Config, PipelineConfig, MAX_RATE_LIMIT};
use crate::{ConfigError, ConfigResult};
use url::Url;

/// Clamps the configuration into shape and validates it
///
/// The request rate is clamped first (see [`clamp_rate`]), then every
/// section is validated. This is the last step before a [`Config`] is handed
/// to the pipeline.
pub fn finalize(mut config: Config) -> ConfigResult<Config> {
    config.pipeline.rate = clamp_rate(config.pipeline.rate);
    validate(&config)?;
    Ok(config)
}

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_api_config(&config.api)?;
    validate_pipeline_config(&config.pipeline)?;
    validate_backoff_config(&config.backoff)?;
    Ok(())
}

/// Maps a requested rate onto (0, MAX_RATE_LIMIT]
///
/// Non-positive, non-finite and too-large rates all mean "as fast as the API
/// allows".
pub fn clamp_rate(rate: f64) -> f64 {
    if !rate.is_finite() || rate <= 0.0 || rate > MAX_RATE_LIMIT {
        MAX_RATE_LIMIT
    } else {
        rate
    }
}

/// Validates remote API configuration
fn validate_api_config(config: &ApiConfig) -> ConfigResult<()> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent is required and should say how to contact you, e.g. admin@example.com"
                .to_string(),
        ));
    }

    validate_lang(&config.lang)?;

    let endpoint = config.endpoint();
    let url = Url::parse(&endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use HTTP or HTTPS",
            endpoint
        )));
    }

    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "request-timeout must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates a language code such as "en" or "zh-yue"
fn validate_lang(lang: &str) -> ConfigResult<()> {
    if lang.is_empty() {
        return Err(ConfigError::Validation("lang is required, e.g. 'en'".to_string()));
    }

    if !lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        || lang.starts_with('-')
        || lang.ends_with('-')
    {
        return Err(ConfigError::Validation(format!(
            "lang must be a language code like 'en', got '{}'",
            lang
        )));
    }

    Ok(())
}

/// Validates pipeline configuration
fn validate_pipeline_config(config: &PipelineConfig) -> ConfigResult<()> {
    if !(config.rate > 0.0 && config.rate <= MAX_RATE_LIMIT) {
        return Err(ConfigError::Validation(format!(
            "rate must be within (0, {}], got {}",
            MAX_RATE_LIMIT, config.rate
        )));
    }

    Ok(())
}

/// Validates backoff configuration
fn validate_backoff_config(config: &BackoffConfig) -> ConfigResult<()> {
    if config.initial_interval == 0 {
        return Err(ConfigError::Validation(
            "initial-interval must be greater than 0".to_string(),
        ));
    }

    if !config.multiplier.is_finite() || config.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "multiplier must be >= 1.0, got {}",
            config.multiplier
        )));
    }

    if !(0.0..=1.0).contains(&config.randomization_factor) {
        return Err(ConfigError::Validation(format!(
            "randomization-factor must be between 0 and 1, got {}",
            config.randomization_factor
        )));
    }

    if config.initial_interval > config.max_interval {
        return Err(ConfigError::Validation(format!(
            "initial-interval ({}ms) cannot exceed max-interval ({}ms)",
            config.initial_interval, config.max_interval
        )));
    }

    Ok(())
}
