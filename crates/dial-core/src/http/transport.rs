//! Transport seam between the executor and the network
//!
//! The executor only needs two suspending operations: send a request and
//! sleep between attempts. [`ReqwestTransport`] provides them over a shared,
//! pooled `reqwest::Client`; tests substitute scripted transports.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

/// Transport-level failure of a single attempt
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response within the attempt's timeout
    #[error("request timed out: {0}")]
    Timeout(#[source] anyhow::Error),

    /// Connection reset, DNS failure, TLS error and the like
    #[error("transport failure: {0}")]
    Other(#[source] anyhow::Error),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.into())
        } else {
            TransportError::Other(err.into())
        }
    }
}

/// I/O capability the request executor is written against
pub trait Transport: Send + Sync {
    /// Dispatch one request
    fn send(
        &self,
        request: reqwest::Request,
    ) -> impl Future<Output = Result<reqwest::Response, TransportError>> + Send;

    /// Wait before the next attempt
    fn sleep(&self, delay: Duration) -> impl Future<Output = ()> + Send;
}

/// Transport backed by a pooled `reqwest::Client` and the Tokio timer
///
/// Clones share the same pool and the same cap on sends in flight. A send
/// holds its permit until the response headers arrive; reading the body,
/// including an open event stream, does not count against the cap.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    in_flight: Arc<Semaphore>,
}

impl ReqwestTransport {
    /// `max_in_flight` caps sends waiting for response headers
    pub fn new(client: reqwest::Client, max_in_flight: usize) -> Self {
        Self {
            client,
            in_flight: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Sends that could start right now without waiting for a permit
    pub fn available_permits(&self) -> usize {
        self.in_flight.available_permits()
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: reqwest::Request) -> Result<reqwest::Response, TransportError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| TransportError::Other(e.into()))?;
        Ok(self.client.execute(request).await?)
    }

    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}
