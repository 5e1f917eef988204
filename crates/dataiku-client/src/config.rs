//! Connection settings for a DSS instance.

use std::env;
use std::time::Duration;

use crate::error::{Error, Result};

pub const HOST_ENV: &str = "DSS_HOST";
pub const API_KEY_ENV: &str = "DSS_API_KEY";
pub const INSECURE_TLS_ENV: &str = "DSS_INSECURE_TLS";
pub const POLL_INTERVAL_ENV: &str = "DSS_POLL_INTERVAL_MS";
pub const TIMEOUT_ENV: &str = "DSS_TIMEOUT_SECS";

const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Everything needed to reach a DSS instance.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the instance, without trailing slash.
    pub host: String,
    pub api_key: String,
    /// Accept self-signed certificates.
    pub insecure_tls: bool,
    /// Delay between polls while waiting on jobs and scenario runs.
    pub poll_interval: Duration,
    pub timeout: Duration,
}

// Hand-written so the API key never lands in logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("api_key", &"***")
            .field("insecure_tls", &self.insecure_tls)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            insecure_tls: true,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Build the configuration from `DSS_HOST`, `DSS_API_KEY` and friends.
    ///
    /// `DSS_INSECURE_TLS` defaults to `true`; any value other than a
    /// case-insensitive `"true"` disables it.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::MissingConfig(HOST_ENV))?;
        let api_key = lookup(API_KEY_ENV)
            .filter(|v| !v.trim().is_empty())
            .ok_or(Error::MissingConfig(API_KEY_ENV))?;

        let mut config = Self::new(host, api_key);
        config.insecure_tls = lookup(INSECURE_TLS_ENV)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);
        if let Some(ms) = lookup(POLL_INTERVAL_ENV).and_then(|v| v.parse::<u64>().ok()) {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = lookup(TIMEOUT_ENV).and_then(|v| v.parse::<u64>().ok()) {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Root of the public REST API.
    pub fn api_base(&self) -> String {
        format!("{}/public/api", self.host)
    }
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
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_host_is_reported() {
        let err = ClientConfig::from_lookup(lookup(&[(API_KEY_ENV, "k")])).unwrap_err();
        assert_eq!(err.to_string(), "DSS_HOST environment variable is required");
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = ClientConfig::from_lookup(lookup(&[(HOST_ENV, "https://dss")])).unwrap_err();
        assert_eq!(err.to_string(), "DSS_API_KEY environment variable is required");
    }

    #[test]
    fn insecure_tls_defaults_to_true() {
        let config =
            ClientConfig::from_lookup(lookup(&[(HOST_ENV, "https://dss/"), (API_KEY_ENV, "k")]))
                .unwrap();
        assert!(config.insecure_tls);
        assert_eq!(config.host, "https://dss");
        assert_eq!(config.api_base(), "https://dss/public/api");
    }

    #[test]
    fn insecure_tls_only_true_when_literal_true() {
        for (raw, expected) in [("TRUE", true), ("false", false), ("1", false)] {
            let config = ClientConfig::from_lookup(lookup(&[
                (HOST_ENV, "h"),
                (API_KEY_ENV, "k"),
                (INSECURE_TLS_ENV, raw),
            ]))
            .unwrap();
            assert_eq!(config.insecure_tls, expected, "value {raw}");
        }
    }

    #[test]
    fn poll_interval_override() {
        let config = ClientConfig::from_lookup(lookup(&[
            (HOST_ENV, "h"),
            (API_KEY_ENV, "k"),
            (POLL_INTERVAL_ENV, "10"),
        ]))
        .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn debug_hides_api_key() {
        let config = ClientConfig::new("h", "super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
