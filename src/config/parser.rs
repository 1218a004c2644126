use crate::config::types::Config;
use crate::{ConfigError, ConfigResult};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// The file only provides defaults: command-line flags are layered on top and
/// the merged result goes through [`crate::config::finalize`]. Every key is
/// optional, so a partial file is fine.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(ConfigError)` - Failed to read or parse the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use wiki_ipsum::config::load_config;
///
/// let config = load_config(Path::new("wiki-ipsum.toml")).unwrap();
/// println!("Rate: {}", config.pipeline.rate);
/// ```
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from TOML text
pub fn parse_config(content: &str) -> ConfigResult<Config> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}
