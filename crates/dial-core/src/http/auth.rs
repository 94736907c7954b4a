//! Authentication handling for the gateway
//!
//! Supports two mutually exclusive schemes:
//! - API keys in the vendor `Api-Key` header
//! - Bearer tokens in the standard `Authorization` header
//!
//! The secret itself is a [`Credential`]: a fixed string or a producer that
//! is invoked again for every request, so rotating secrets are picked up
//! without rebuilding the client.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Header carrying the raw secret under the API-key scheme
pub const API_KEY_HEADER: &str = "Api-Key";

/// Standard authorization header used by the bearer scheme
pub const AUTHORIZATION_HEADER: &str = "Authorization";

type SyncProducer = Arc<dyn Fn() -> String + Send + Sync>;
type AsyncProducer =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = String> + Send>> + Send + Sync>;

/// Source of the secret placed into the authentication header
#[derive(Clone)]
pub enum Credential {
    /// A fixed secret
    Static(String),
    /// Synchronous producer, called once per request
    Sync(SyncProducer),
    /// Asynchronous producer, awaited once per request
    Async(AsyncProducer),
}

impl Credential {
    /// Wrap a synchronous producer
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(producer))
    }

    /// Wrap an asynchronous producer, e.g. a refreshable token fetcher
    pub fn from_async_fn<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self::Async(Arc::new(move || Box::pin(producer())))
    }

    /// Resolve the secret for a single request
    pub async fn resolve(&self) -> String {
        match self {
            Self::Static(secret) => secret.clone(),
            Self::Sync(producer) => producer(),
            Self::Async(producer) => producer().await,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret.
        match self {
            Self::Static(_) => f.write_str("Credential::Static(***)"),
            Self::Sync(_) => f.write_str("Credential::Sync(..)"),
            Self::Async(_) => f.write_str("Credential::Async(..)"),
        }
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self::Static(secret)
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::Static(secret.to_string())
    }
}

/// Authentication scheme, fixed at client construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    ApiKey,
    BearerToken,
}

/// Turns a credential into concrete request headers
#[derive(Debug, Clone)]
pub struct AuthProvider {
    credential: Credential,
    scheme: AuthScheme,
}

impl AuthProvider {
    pub fn new(credential: Credential, scheme: AuthScheme) -> Self {
        Self { credential, scheme }
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Resolve the credential and produce the authentication headers
    pub async fn headers(&self) -> HashMap<String, String> {
        let secret = self.credential.resolve().await;
        let mut headers = HashMap::with_capacity(1);
        match self.scheme {
            AuthScheme::ApiKey => {
                headers.insert(API_KEY_HEADER.to_string(), secret);
            }
            AuthScheme::BearerToken => {
                headers.insert(AUTHORIZATION_HEADER.to_string(), format!("Bearer {}", secret));
            }
        }
        headers
    }
}
