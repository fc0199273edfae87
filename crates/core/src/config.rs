//! Environment-variable parsing shared by every `*Config::from_env`.
//!
//! Each helper reads through a lookup function so configs can be built from
//! the process environment in production and from a map in tests.

use std::str::FromStr;

/// A variable lookup, usually `|key| std::env::var(key).ok()`.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Reads the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// The trimmed value, treating blank as unset.
pub fn optional(lookup: Lookup<'_>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn required(lookup: Lookup<'_>, key: &'static str) -> Result<String, ConfigError> {
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

/// Parse an optional variable, falling back to `default` when unset.
pub fn parse_or<T>(lookup: Lookup<'_>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(lookup, key) {
        Some(raw) => parse_value(key, raw),
        None => Ok(default),
    }
}

/// Parse a variable that must be present.
pub fn parse_required<T>(lookup: Lookup<'_>, key: &'static str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, required(lookup, key)?)
}

/// `true`/`false`, `1`/`0`, `yes`/`no`, case-insensitive.
pub fn flag_or(lookup: Lookup<'_>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = optional(lookup, key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected a boolean".into(),
        }),
    }
}

/// Comma-separated list with blank entries dropped.
pub fn list(lookup: Lookup<'_>, key: &str) -> Vec<String> {
    optional(lookup, key)
        .map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_value<T>(key: &'static str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value: raw,
    })
}
