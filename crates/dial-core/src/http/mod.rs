//! HTTP plumbing for gateway communication
//!
//! This module provides:
//! - Request building with URL merging and header overlays
//! - Credential resolution per attempt
//! - Retry with exponential backoff and jitter
//! - Mapping of failed responses into the crate error taxonomy
//! - Response decoding, including server-sent event streams

pub mod auth;
pub mod builder;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod retry;
pub mod stream;
pub mod transport;

pub use auth::{AuthProvider, AuthScheme, Credential};
pub use builder::{merge_url, FilePart, RequestBuilder, RequestOptions};
pub use client::HttpClient;
pub use config::{parse_base_url, ClientConfig, PoolConfig, TimeoutConfig, DEFAULT_MAX_RETRIES};
pub use decoder::{Decoded, Expect};
pub use error::{ErrorHook, ErrorMapper, FailedResponse};
pub use retry::{AttemptOutcome, RetryPolicy, RetryState};
pub use stream::ChunkStream;
pub use transport::{ReqwestTransport, Transport, TransportError};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
