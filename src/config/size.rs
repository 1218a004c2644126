//! Human-readable size strings
//!
//! Accepts the forms `500`, `100 byte`, `100 bytes`, `1.5 Kb` and `2 MB`
//! (one optional space, units case-insensitive). Kb and MB are binary units.

use crate::{ConfigError, ConfigResult};
use regex::Regex;
use std::sync::OnceLock;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

fn size_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(\d+(?:\.\d+)?)\s?(bytes?|kb|mb)?$").expect("size pattern is valid")
    })
}

/// Parses a size string into a number of bytes
///
/// An empty (or all-whitespace) string means "no limit" and yields 0.
/// Fractions are only meaningful with Kb/MB; the result is rounded to the
/// nearest byte.
///
/// # Example
///
/// ```
/// use wiki_ipsum::config::parse_size;
///
/// assert_eq!(parse_size("500").unwrap(), 500);
/// assert_eq!(parse_size("1.5 Kb").unwrap(), 1536);
/// ```
pub fn parse_size(input: &str) -> ConfigResult<usize> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    let captures = size_pattern()
        .captures(trimmed)
        .ok_or_else(|| ConfigError::InvalidSize(input.to_string()))?;

    let number = &captures[1];
    let unit = captures.get(2).map(|m| m.as_str().to_ascii_lowercase());

    let factor = match unit.as_deref() {
        None | Some("byte") | Some("bytes") => {
            // Plain byte counts must be whole numbers
            if number.contains('.') {
                return Err(ConfigError::InvalidSize(input.to_string()));
            }
            1.0
        }
        Some("kb") => KIB,
        Some("mb") => MIB,
        Some(_) => return Err(ConfigError::InvalidSize(input.to_string())),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| ConfigError::InvalidSize(input.to_string()))?;

    Ok((value * factor).round() as usize)
}
