//! Environment configuration helpers.
//!
//! Every binary reads its settings through a lookup function so tests can
//! supply a map instead of mutating the process environment.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// A variable lookup: `std::env::var` in production, a map in tests.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Reads from the process environment.
#[must_use]
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Returns the value of `name`, or `default` when unset.
#[must_use]
pub fn string_or(lookup: Lookup<'_>, name: &str, default: &str) -> String {
    lookup(name).unwrap_or_else(|| default.to_owned())
}

/// Returns the value of `name`.
///
/// # Errors
///
/// Returns `ConfigError::Missing` if it is unset.
pub fn required(lookup: Lookup<'_>, name: &'static str) -> Result<String, ConfigError> {
    lookup(name).ok_or(ConfigError::Missing(name))
}

/// Parses `name`, or returns `default` when unset.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if the value does not parse.
pub fn parsed_or<T>(lookup: Lookup<'_>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Parses `name` as milliseconds, or returns `default_ms` when unset.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` if the value is not a whole number.
pub fn millis_or(
    lookup: Lookup<'_>,
    name: &'static str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    parsed_or(lookup, name, default_ms).map(Duration::from_millis)
}

/// Parses a boolean flag: `true`/`1`/`yes` or `false`/`0`/`no`.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for anything else.
pub fn flag_or(lookup: Lookup<'_>, name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name,
                value,
                reason: "expected true or false".into(),
            }),
        },
    }
}

/// Where a service listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenConfig {
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl ListenConfig {
    /// Reads `HOST` and `PORT`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `PORT` is not a valid port.
    pub fn from_lookup(lookup: Lookup<'_>, default_port: u16) -> Result<Self, ConfigError> {
        Ok(Self {
            host: string_or(lookup, "HOST", "0.0.0.0"),
            port: parsed_or(lookup, "PORT", default_port)?,
        })
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `HOST:PORT` is not an address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            name: "HOST",
            value: raw.clone(),
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_listen_config_uses_defaults_when_unset() {
        let lookup = lookup_from(&[]);

        let config = ListenConfig::from_lookup(&lookup, 8080).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_invalid_port_is_reported_with_name() {
        let lookup = lookup_from(&[("PORT", "eighty")]);

        let err = ListenConfig::from_lookup(&lookup, 8080).unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_flag_accepts_common_spellings() {
        let lookup = lookup_from(&[("A", "TRUE"), ("B", "0"), ("C", "maybe")]);

        assert!(flag_or(&lookup, "A", false).unwrap());
        assert!(!flag_or(&lookup, "B", true).unwrap());
        assert!(flag_or(&lookup, "C", false).is_err());
        assert!(flag_or(&lookup, "D", true).unwrap());
    }

    #[test]
    fn test_millis_parses_duration() {
        let lookup = lookup_from(&[("RPC_TIMEOUT_MS", "250")]);

        assert_eq!(
            millis_or(&lookup, "RPC_TIMEOUT_MS", 5000).unwrap(),
            Duration::from_millis(250)
        );
        assert_eq!(
            millis_or(&lookup, "OTHER_MS", 5000).unwrap(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_required_reports_missing_variable() {
        let lookup = lookup_from(&[]);

        assert_eq!(
            required(&lookup, "DATABASE_URL"),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }
}
