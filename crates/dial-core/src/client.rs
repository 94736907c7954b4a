//! Asynchronous gateway client and its builder

use std::sync::Arc;
use std::time::Duration;

use crate::http::{
    parse_base_url, AuthProvider, AuthScheme, ClientConfig, Credential, HttpClient, PoolConfig,
    RetryPolicy, TimeoutConfig, DEFAULT_MAX_RETRIES,
};
use crate::resources::{Applications, Chat, Deployments, Files};
use crate::{Error, Result};

/// Builder for [`Dial`] and, with the `blocking` feature, [`crate::blocking::Dial`]
///
/// Exactly one of [`api_key`](Self::api_key) and
/// [`bearer_token`](Self::bearer_token) must be set.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: Option<String>,
    api_key: Option<Credential>,
    bearer_token: Option<Credential>,
    max_retries: u32,
    timeouts: TimeoutConfig,
    pool: PoolConfig,
    retry: RetryPolicy,
    api_version: Option<String>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            bearer_token: None,
            max_retries: DEFAULT_MAX_RETRIES,
            timeouts: TimeoutConfig::default(),
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            api_version: None,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gateway root, e.g. `https://dial.example.com`
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Authenticate with the `Api-Key` header
    pub fn api_key(mut self, credential: impl Into<Credential>) -> Self {
        self.api_key = Some(credential.into());
        self
    }

    /// Authenticate with `Authorization: Bearer`
    pub fn bearer_token(mut self, credential: impl Into<Credential>) -> Self {
        self.bearer_token = Some(credential.into());
        self
    }

    /// Retries after the first attempt, per call
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Per-attempt request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout = timeout;
        self
    }

    pub fn pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `api-version` sent with chat completions unless a call sets its own
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Validate the settings and assemble a [`ClientConfig`]
    pub fn config(self) -> Result<ClientConfig> {
        let raw = self
            .base_url
            .ok_or_else(|| Error::configuration("A base URL is required"))?;
        let base_url = parse_base_url(&raw)?;

        let auth = match (self.api_key, self.bearer_token) {
            (Some(key), None) => AuthProvider::new(key, AuthScheme::ApiKey),
            (None, Some(token)) => AuthProvider::new(token, AuthScheme::BearerToken),
            (Some(_), Some(_)) => {
                return Err(Error::configuration(
                    "Provide either an API key or a bearer token, not both",
                ))
            }
            (None, None) => {
                return Err(Error::configuration(
                    "Either an API key or a bearer token is required",
                ))
            }
        };

        let config = ClientConfig {
            base_url,
            auth,
            max_retries: self.max_retries,
            timeouts: self.timeouts,
            pool: self.pool,
            retry: self.retry,
            api_version: self.api_version,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the asynchronous client
    pub fn build(self) -> Result<Dial> {
        Dial::new(self.config()?)
    }

    /// Build the blocking client
    #[cfg(feature = "blocking")]
    pub fn build_blocking(self) -> Result<crate::blocking::Dial> {
        crate::blocking::Dial::new(self.config()?)
    }
}

/// Asynchronous client for a DIAL gateway
///
/// Cheap to clone; clones share one connection pool. Any number of calls may
/// run concurrently on the same client.
///
/// ```no_run
/// use dial_core::{ChatCompletionRequest, Dial, Message};
///
/// # async fn example() -> dial_core::Result<()> {
/// let client = Dial::builder()
///     .base_url("https://dial.example.com")
///     .api_key("secret")
///     .build()?;
/// let request = ChatCompletionRequest::new(vec![Message::user("Hello")]);
/// let completion = client.chat().completions().create("gpt-4o", &request).await?;
/// println!("{}", completion.content().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Dial {
    http: Arc<HttpClient>,
    api_version: Option<String>,
}

impl Dial {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from a validated configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api_version = config.api_version.clone();
        Ok(Self {
            http: Arc::new(HttpClient::new(config)?),
            api_version,
        })
    }

    pub fn chat(&self) -> Chat<'_> {
        Chat::new(&self.http, self.api_version.as_deref())
    }

    pub fn applications(&self) -> Applications<'_> {
        Applications::new(&self.http)
    }

    pub fn deployments(&self) -> Deployments<'_> {
        Deployments::new(&self.http)
    }

    pub fn files(&self) -> Files<'_> {
        Files::new(&self.http)
    }

    /// Request executor, for endpoints without a dedicated resource
    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ClientBuilder {
        Dial::builder().base_url("https://dial.example.com")
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().api_key("k").config().unwrap();
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.auth.scheme(), AuthScheme::ApiKey);
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.api_version, None);
    }

    #[test]
    fn test_api_version_reaches_config() {
        let config = builder().api_key("k").api_version("2024-02-01").config().unwrap();
        assert_eq!(config.api_version.as_deref(), Some("2024-02-01"));
    }

    #[test]
    fn test_bearer_scheme() {
        let config = builder().bearer_token("t").config().unwrap();
        assert_eq!(config.auth.scheme(), AuthScheme::BearerToken);
    }

    #[test]
    fn test_credentials_are_mutually_exclusive() {
        let err = builder().api_key("k").bearer_token("t").config().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let err = builder().config().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_base_url_required() {
        let err = Dial::builder().api_key("k").config().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));

        let err = Dial::builder()
            .base_url("dial.example.com")
            .api_key("k")
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_invalid_timeouts_rejected() {
        let err = builder()
            .api_key("k")
            .timeout(Duration::from_secs(1))
            .connect_timeout(Duration::from_secs(10))
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_build_async_client() {
        let client = builder().api_key("k").max_retries(5).build().unwrap();
        assert_eq!(client.http().base_url().as_str(), "https://dial.example.com/");
    }
}
