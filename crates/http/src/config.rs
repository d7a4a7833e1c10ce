//! Client configuration (environment-driven, with defaults).

use std::time::Duration;

use thiserror::Error;

/// Backend domain used when none is configured.
pub const DEFAULT_API_DOMAIN: &str = "api.bizdesk.app";

pub const ENV_API_DOMAIN: &str = "BIZDESK_API_DOMAIN";
pub const ENV_API_SCHEME: &str = "BIZDESK_API_SCHEME";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "BIZDESK_REQUEST_TIMEOUT_SECS";
pub const ENV_GET_RETRIES: &str = "BIZDESK_GET_RETRIES";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be 'http' or 'https', got '{value}'")]
    InvalidScheme { var: &'static str, value: String },

    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum Scheme {
    Http,
    #[default]
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl core::fmt::Display for Scheme {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport-failure retry policy.
///
/// Only GET requests are ever retried, and only when no response was
/// obtained. HTTP error responses are returned immediately.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_get_retries: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_get_retries: 0,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_get_retries: 2,
            backoff: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_domain: String,
    pub scheme: Scheme,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_domain: DEFAULT_API_DOMAIN.to_string(),
            scheme: Scheme::default(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Load from `BIZDESK_*` environment variables.
    ///
    /// Unset or empty variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(domain) = get(ENV_API_DOMAIN) {
            config.api_domain = domain;
        }

        if let Some(scheme) = get(ENV_API_SCHEME) {
            config.scheme = match scheme.to_ascii_lowercase().as_str() {
                "http" => Scheme::Http,
                "https" => Scheme::Https,
                _ => {
                    return Err(ConfigError::InvalidScheme {
                        var: ENV_API_SCHEME,
                        value: scheme,
                    });
                }
            };
        }

        if let Some(raw) = get(ENV_REQUEST_TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(parse_number(ENV_REQUEST_TIMEOUT_SECS, raw)?);
        }

        if let Some(raw) = get(ENV_GET_RETRIES) {
            let retries = parse_number(ENV_GET_RETRIES, raw)?;
            config.retry.max_get_retries =
                u32::try_from(retries).map_err(|_| ConfigError::InvalidNumber {
                    var: ENV_GET_RETRIES,
                    value: retries.to_string(),
                })?;
        }

        Ok(config)
    }
}

fn parse_number(var: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber { var, value: raw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_when_unset_or_empty() {
        let config = ClientConfig::from_lookup(lookup(&[(ENV_API_DOMAIN, "  ")])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_domain, DEFAULT_API_DOMAIN);
        assert_eq!(config.scheme, Scheme::Https);
    }

    #[test]
    fn reads_every_variable() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_API_DOMAIN, "erp.example.com"),
            (ENV_API_SCHEME, "HTTP"),
            (ENV_REQUEST_TIMEOUT_SECS, "5"),
            (ENV_GET_RETRIES, "0"),
        ]))
        .unwrap();

        assert_eq!(config.api_domain, "erp.example.com");
        assert_eq!(config.scheme, Scheme::Http);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_get_retries, 0);
    }

    #[test]
    fn rejects_malformed_values() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_API_SCHEME, "ftp")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidScheme { .. }));

        let err = ClientConfig::from_lookup(lookup(&[(ENV_GET_RETRIES, "-1")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: ENV_GET_RETRIES,
                value: "-1".to_string()
            }
        );
    }
}
