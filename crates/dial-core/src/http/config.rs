//! Client configuration: timeouts, connection pool limits and retries
//!
//! Timeouts apply to a single attempt, not to the whole retrying sequence.
//! For buffered calls the request timeout covers the whole exchange, body
//! included. Event streams only wait that long for the response headers and
//! then for each read of the body, so a long generation is never cut off
//! while chunks keep arriving.

use std::time::Duration;

use reqwest::Url;

use crate::http::auth::AuthProvider;
use crate::http::retry::RetryPolicy;
use crate::{Error, Result};

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Timeout configuration for gateway requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Round trip of one attempt; for event streams, the limit on each wait
    pub request_timeout: Duration,
    /// Time to establish a connection
    pub connect_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TimeoutConfig {
    /// Override the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Validate timeout configuration
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::configuration("Connect timeout cannot be zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::configuration("Request timeout cannot be zero"));
        }
        if self.request_timeout < self.connect_timeout {
            return Err(Error::configuration(
                "Request timeout should be >= connect timeout",
            ));
        }
        Ok(())
    }
}

/// Connection pool limits shared by every call of one client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on requests waiting for response headers
    ///
    /// A permit is held from dispatch until the headers arrive. Bodies read
    /// afterwards, open event streams included, do not hold one.
    pub max_connections: usize,
    /// Idle connections kept alive per host
    pub max_keepalive: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            max_keepalive: 100,
        }
    }
}

/// Full configuration of a gateway client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub auth: AuthProvider,
    pub max_retries: u32,
    pub timeouts: TimeoutConfig,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    /// Default `api-version` for chat completions
    pub api_version: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: Url, auth: AuthProvider) -> Self {
        Self {
            base_url,
            auth,
            max_retries: DEFAULT_MAX_RETRIES,
            timeouts: TimeoutConfig::default(),
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            api_version: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;
        if self.pool.max_connections == 0 {
            return Err(Error::configuration("max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Build the pooled HTTP client all calls share
    ///
    /// No client-wide deadline is set; each request carries its own.
    pub fn build_http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .connect_timeout(self.timeouts.connect_timeout)
            .pool_max_idle_per_host(self.pool.max_keepalive)
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })
    }
}

/// Parse and check a gateway base URL
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::configuration(format!("Invalid base URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        _ => Err(Error::configuration(format!(
            "Base URL must be an http(s) URL with a host: {}",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::auth::AuthScheme;

    #[test]
    fn test_timeout_config_default() {
        let config = TimeoutConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(600));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_config_validation() {
        let config = TimeoutConfig::default().with_connect_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = TimeoutConfig::default().with_request_timeout(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = TimeoutConfig::default()
            .with_request_timeout(Duration::from_secs(1))
            .with_connect_timeout(Duration::from_secs(2));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_client_config_defaults() {
        let url = parse_base_url("https://gateway.example").unwrap();
        let auth = AuthProvider::new("k".into(), AuthScheme::ApiKey);
        let config = ClientConfig::new(url, auth);

        assert_eq!(config.max_retries, 2);
        assert_eq!(config.pool.max_connections, 1000);
        assert_eq!(config.pool.max_keepalive, 100);
        assert!(config.validate().is_ok());
        assert!(config.build_http_client().is_ok());
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://host/v1/").is_ok());
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("ftp://host").is_err());
        assert!(parse_base_url("mailto:me@example.com").is_err());
    }
}
