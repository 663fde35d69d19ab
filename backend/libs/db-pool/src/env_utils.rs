//! Environment variable parsing utilities
//!
//! Safe parsing with defaults, so configuration code needs no unwrap() calls.

use std::str::FromStr;

/// Parse an environment variable, falling back to `default` when it is
/// missing or does not parse
pub fn parse_env_with_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a required environment variable
pub fn parse_env_required<T: FromStr>(key: &str) -> Result<T, String> {
    std::env::var(key)
        .map_err(|_| format!("Environment variable {} not found", key))?
        .parse()
        .map_err(|_| format!("Failed to parse environment variable {}", key))
}
