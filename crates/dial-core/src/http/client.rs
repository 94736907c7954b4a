//! Request executor orchestrating auth, building, retries and decoding
//!
//! One retry loop is the whole per-call state machine: build the wire
//! request with freshly resolved credentials, send it, read a buffered body,
//! and on failure either back off and retry or map the failure into an
//! [`Error`]. A body that cannot be read counts as a transport failure; only
//! a body that was read but does not decode is a parsing error. The loop is
//! written once against [`Transport`]; the async client awaits it and the
//! blocking client drives it on a private runtime. Dropping the returned future
//! cancels the in-flight request and any backoff sleep.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::http::auth::AuthProvider;
use crate::http::builder::{RequestBuilder, RequestOptions};
use crate::http::config::ClientConfig;
use crate::http::decoder::{decode, Decoded, Expect, Received};
use crate::http::error::{ErrorHook, ErrorMapper, FailedResponse};
use crate::http::retry::{AttemptOutcome, RetryPolicy, RetryState};
use crate::http::stream::ChunkStream;
use crate::http::transport::{ReqwestTransport, Transport, TransportError};
use crate::{Error, Result};

/// Why an attempt did not succeed
enum Failure {
    Transport(TransportError),
    Status(reqwest::Response),
}

impl Failure {
    fn outcome(&self) -> AttemptOutcome {
        match self {
            Failure::Transport(TransportError::Timeout(_)) => AttemptOutcome::TimedOut,
            Failure::Transport(TransportError::Other(_)) => AttemptOutcome::TransportFailed,
            Failure::Status(response) => AttemptOutcome::Status(response.status()),
        }
    }
}

/// How long one attempt may take
#[derive(Debug, Clone, Copy)]
enum Deadline {
    /// Headers and body within the timeout
    Whole,
    /// Headers within the timeout; the body is read later, one bounded wait at a time
    Headers,
}

async fn read_body(response: reqwest::Response) -> std::result::Result<Bytes, TransportError> {
    response.bytes().await.map_err(TransportError::from)
}

async fn keep_unread(
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, TransportError> {
    Ok(response)
}

/// Executor shared by the async and blocking gateway clients
#[derive(Debug, Clone)]
pub struct HttpClient<T = ReqwestTransport> {
    transport: T,
    builder: RequestBuilder,
    auth: AuthProvider,
    max_retries: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpClient<ReqwestTransport> {
    /// Create an executor with its own connection pool
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let client = config.build_http_client()?;
        let transport = ReqwestTransport::new(client.clone(), config.pool.max_connections);
        Ok(Self::with_transport(config, client, transport))
    }
}

impl<T: Transport> HttpClient<T> {
    /// Create an executor over an explicit transport
    ///
    /// `client` is only used to assemble requests; `transport` sends them.
    pub fn with_transport(config: ClientConfig, client: reqwest::Client, transport: T) -> Self {
        Self {
            transport,
            builder: RequestBuilder::new(client, config.base_url),
            auth: config.auth,
            max_retries: config.max_retries,
            timeout: config.timeouts.request_timeout,
            retry: config.retry,
        }
    }

    pub fn base_url(&self) -> &reqwest::Url {
        self.builder.base_url()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one logical call and decode the result into `expect`
    pub async fn execute<R>(
        &self,
        options: &RequestOptions,
        expect: Expect,
        hook: Option<&ErrorHook>,
    ) -> Result<Decoded<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        let received = if expect.is_buffered() {
            Received::Buffered(self.run(options, hook, Deadline::Whole, read_body).await?)
        } else if expect == Expect::EventStream {
            Received::Unread(self.run(options, hook, Deadline::Headers, keep_unread).await?)
        } else {
            Received::Unread(self.run(options, hook, Deadline::Whole, keep_unread).await?)
        };
        let read_timeout = (expect == Expect::EventStream).then(|| self.timeout_for(options));
        decode(expect, received, read_timeout)
    }

    /// Run one logical call up to a successful response, leaving the body unread
    pub async fn send(
        &self,
        options: &RequestOptions,
        hook: Option<&ErrorHook>,
    ) -> Result<reqwest::Response> {
        self.run(options, hook, Deadline::Whole, keep_unread).await
    }

    fn timeout_for(&self, options: &RequestOptions) -> Duration {
        options.timeout.unwrap_or(self.timeout)
    }

    /// The retry loop; `complete` finishes a 2xx response inside it
    #[instrument(name = "dial_request", skip_all, fields(method = %options.method, url = %options.url))]
    async fn run<O, F, Fut>(
        &self,
        options: &RequestOptions,
        hook: Option<&ErrorHook>,
        deadline: Deadline,
        complete: F,
    ) -> Result<O>
    where
        F: Fn(reqwest::Response) -> Fut,
        Fut: Future<Output = std::result::Result<O, TransportError>>,
    {
        options.validate()?;

        let mut state = RetryState::new(options.max_retries.unwrap_or(self.max_retries));
        let timeout = self.timeout_for(options);

        loop {
            let auth_headers = self.auth.headers().await;
            let total = matches!(deadline, Deadline::Whole).then_some(timeout);
            let request = self.builder.build(options, auth_headers, total)?;
            let url = request.url().clone();

            let sent = match deadline {
                Deadline::Whole => self.transport.send(request).await,
                Deadline::Headers => {
                    match tokio::time::timeout(timeout, self.transport.send(request)).await {
                        Ok(sent) => sent,
                        Err(elapsed) => Err(TransportError::Timeout(elapsed.into())),
                    }
                }
            };

            let failure = match sent {
                Ok(response) if response.status().is_success() => match complete(response).await {
                    Ok(done) => return Ok(done),
                    Err(e) => {
                        tracing::debug!(url = %url, error = %e, "Failed to read response body");
                        Failure::Transport(e)
                    }
                },
                Ok(response) => Failure::Status(response),
                Err(e) => Failure::Transport(e),
            };

            let outcome = failure.outcome();
            let attempt = state.attempt_index();
            if self.retry.should_retry(outcome) && state.consume() {
                let delay = self.retry.delay(attempt);
                tracing::debug!(
                    remaining_retries = state.remaining(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    url = %url,
                    outcome = ?outcome,
                    "Retrying request"
                );
                // Release the failed response before waiting.
                drop(failure);
                self.transport.sleep(delay).await;
                continue;
            }

            let error = Self::terminal_error(failure, hook).await;
            tracing::debug!(
                url = %url,
                status = error.status_code(),
                error_type = error.error_type(),
                "Request failed: {}",
                error
            );
            return Err(error);
        }
    }

    async fn terminal_error(failure: Failure, hook: Option<&ErrorHook>) -> Error {
        match failure {
            Failure::Transport(TransportError::Timeout(source)) => Error::Timeout {
                source: Some(source),
            },
            Failure::Transport(TransportError::Other(source)) => Error::Transport {
                message: source.to_string(),
                source: Some(source),
            },
            Failure::Status(response) => {
                let failed = FailedResponse::read(response).await;
                ErrorMapper::map_with_hook(&failed, hook)
            }
        }
    }

    /// Call and parse the JSON body into `R`
    pub async fn json<R>(&self, options: &RequestOptions, hook: Option<&ErrorHook>) -> Result<R>
    where
        R: DeserializeOwned + Send + 'static,
    {
        match self.execute(options, Expect::Json, hook).await? {
            Decoded::Json(value) => Ok(value),
            other => unreachable!("decoder returned {:?} for Expect::Json", other.shape()),
        }
    }

    /// Call and return the body as text
    pub async fn text(&self, options: &RequestOptions, hook: Option<&ErrorHook>) -> Result<String> {
        match self.execute::<serde_json::Value>(options, Expect::Text, hook).await? {
            Decoded::Text(text) => Ok(text),
            other => unreachable!("decoder returned {:?} for Expect::Text", other.shape()),
        }
    }

    /// Call and return the raw body
    pub async fn bytes(
        &self,
        options: &RequestOptions,
        hook: Option<&ErrorHook>,
    ) -> Result<Bytes> {
        match self.execute::<serde_json::Value>(options, Expect::Bytes, hook).await? {
            Decoded::Bytes(bytes) => Ok(bytes),
            other => unreachable!("decoder returned {:?} for Expect::Bytes", other.shape()),
        }
    }

    /// Call and discard the body
    pub async fn unit(&self, options: &RequestOptions, hook: Option<&ErrorHook>) -> Result<()> {
        match self.execute::<serde_json::Value>(options, Expect::Nothing, hook).await? {
            Decoded::Nothing => Ok(()),
            other => unreachable!("decoder returned {:?} for Expect::Nothing", other.shape()),
        }
    }

    /// Call and open a server-sent event stream of `R` chunks
    pub async fn stream<R>(
        &self,
        options: &RequestOptions,
        hook: Option<&ErrorHook>,
    ) -> Result<ChunkStream<R>>
    where
        R: DeserializeOwned + Send + 'static,
    {
        match self.execute(options, Expect::EventStream, hook).await? {
            Decoded::Stream(stream) => Ok(stream),
            other => unreachable!("decoder returned {:?} for Expect::EventStream", other.shape()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::auth::{AuthScheme, Credential};
    use crate::http::builder::FilePart;
    use crate::http::config::parse_base_url;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    type Scripted = std::result::Result<(u16, &'static str), TransportError>;

    /// Transport that replays a fixed script and records what it saw
    #[derive(Default)]
    struct ScriptedTransport {
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<reqwest::Request>>,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: reqwest::Request,
        ) -> std::result::Result<reqwest::Response, TransportError> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted");
            next.map(|(status, body)| {
                http::Response::builder()
                    .status(status)
                    .body(body)
                    .unwrap()
                    .into()
            })
        }

        async fn sleep(&self, delay: Duration) {
            self.sleeps.lock().unwrap().push(delay);
        }
    }

    fn executor(
        script: Vec<Scripted>,
        credential: Credential,
    ) -> HttpClient<ScriptedTransport> {
        let base = parse_base_url("https://gateway.test/").unwrap();
        let config = ClientConfig::new(base, AuthProvider::new(credential, AuthScheme::ApiKey));
        HttpClient::with_transport(config, reqwest::Client::new(), ScriptedTransport::new(script))
    }

    fn timeout() -> Scripted {
        Err(TransportError::Timeout(anyhow::anyhow!("deadline elapsed")))
    }

    #[tokio::test]
    async fn test_retries_retryable_statuses_then_succeeds() {
        for status in [408u16, 409, 429] {
            let client = executor(
                vec![Ok((status, "busy")), Ok((200, r#"{"ok": true}"#))],
                "k".into(),
            );
            let value: Value = client
                .json(&RequestOptions::get("ping"), None)
                .await
                .unwrap();
            assert_eq!(value, json!({"ok": true}));
            assert_eq!(client.transport().calls(), 2, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_non_retryable_status_fails_immediately() {
        for status in [400u16, 401, 404, 412, 500, 503] {
            let client = executor(vec![Ok((status, "nope"))], "k".into());
            let err = client.unit(&RequestOptions::get("x"), None).await.unwrap_err();
            assert_eq!(err.status_code(), status);
            assert_eq!(client.transport().calls(), 1);
        }
    }

    #[tokio::test]
    async fn test_stops_when_budget_exhausted() {
        let client = executor(
            vec![
                Ok((429, r#"{"error": {"message": "first"}}"#)),
                Ok((429, r#"{"error": {"message": "second"}}"#)),
                Ok((429, r#"{"error": {"message": "last"}}"#)),
                Ok((200, "{}")),
            ],
            "k".into(),
        );
        let err = client.unit(&RequestOptions::get("x"), None).await.unwrap_err();

        assert_eq!(client.transport().calls(), 3);
        assert_eq!(err.to_string(), "last");
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn test_backoff_delays_follow_policy() {
        let client = executor(
            vec![Ok((429, "")), Ok((429, "")), Ok((200, ""))],
            "k".into(),
        );
        client.unit(&RequestOptions::get("x"), None).await.unwrap();

        let sleeps = client.transport().sleeps.lock().unwrap().clone();
        assert_eq!(sleeps.len(), 2);
        // attempt 0: base 0.5s, attempt 1: base 1.0s, jitter +-0.5s
        assert!(sleeps[0] <= Duration::from_secs(1));
        assert!(sleeps[1] >= Duration::from_millis(500));
        assert!(sleeps[1] <= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_timeout_exhausted() {
        let client = executor(vec![timeout(), timeout(), timeout()], "k".into());
        let err = client.unit(&RequestOptions::get("x"), None).await.unwrap_err();

        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(err.to_string(), "Request timed out");
        assert_eq!(err.status_code(), 408);
        assert_eq!(client.transport().calls(), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_then_success() {
        let client = executor(
            vec![
                Err(TransportError::Other(anyhow::anyhow!("connection reset"))),
                Ok((200, "pong")),
            ],
            "k".into(),
        );
        let text = client.text(&RequestOptions::get("x"), None).await.unwrap();
        assert_eq!(text, "pong");
    }

    #[tokio::test]
    async fn test_transport_failure_exhausted() {
        let client = executor(
            vec![Err(TransportError::Other(anyhow::anyhow!("dns failure")))],
            "k".into(),
        );
        let options = RequestOptions::get("x").max_retries(0);
        let err = client.unit(&options, None).await.unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("dns failure"));
        assert_eq!(client.transport().calls(), 1);
    }

    #[tokio::test]
    async fn test_last_outcome_decides_terminal_error() {
        let client = executor(
            vec![Ok((429, "busy")), timeout(), timeout()],
            "k".into(),
        );
        let err = client.unit(&RequestOptions::get("x"), None).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_credentials_resolved_per_attempt() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let credential = Credential::from_fn(move || {
            format!("key-{}", seen.fetch_add(1, Ordering::SeqCst))
        });
        let client = executor(vec![Ok((409, "")), Ok((200, ""))], credential);
        client.unit(&RequestOptions::get("x"), None).await.unwrap();

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests[0].headers()["api-key"], "key-0");
        assert_eq!(requests[1].headers()["api-key"], "key-1");
    }

    #[tokio::test]
    async fn test_per_call_timeout_override() {
        let client = executor(vec![Ok((200, ""))], "k".into());
        let options = RequestOptions::get("x").timeout(Duration::from_secs(7));
        client.unit(&options, None).await.unwrap();

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests[0].timeout(), Some(&Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_stream_has_no_total_deadline() {
        use futures::StreamExt;

        let body = "data: {\"n\": 1}\n\ndata: [DONE]\n\n";
        let client = executor(vec![Ok((200, body))], "k".into());
        let options = RequestOptions::post("chat").timeout(Duration::from_secs(7));
        let stream = client.stream::<Value>(&options, None).await.unwrap();
        let items: Vec<_> = stream.collect().await;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), &json!({"n": 1}));
        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests[0].timeout(), None);
    }

    #[tokio::test]
    async fn test_hook_overrides_default_mapping() {
        let client = executor(vec![Ok((404, "missing"))], "k".into());
        let hook: ErrorHook = Arc::new(|failed| {
            (failed.status.as_u16() == 404).then(|| Error::ResourceNotFound {
                message: "resource not found".to_string(),
            })
        });
        let err = client
            .unit(&RequestOptions::get("x"), Some(&hook))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_invalid_request_never_sent() {
        let client = executor(vec![], "k".into());
        let options = RequestOptions::put("x")
            .json(json!({}))
            .file(FilePart::new("a", "b"));
        let err = client.unit(&options, None).await.unwrap_err();

        assert!(matches!(err, Error::InvalidRequest { .. }));
        assert_eq!(client.transport().calls(), 0);
    }

    #[tokio::test]
    async fn test_parsing_error_not_retried() {
        let client = executor(vec![Ok((200, "not json"))], "k".into());
        let err = client
            .json::<Value>(&RequestOptions::get("x"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parsing { .. }));
        assert_eq!(client.transport().calls(), 1);
    }
}
