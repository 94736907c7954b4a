//! DIAL Core - client for DIAL chat-completion gateways
//!
//! This crate provides the request/retry/streaming core used to talk to a
//! DIAL gateway, plus thin endpoint resources built on it.
//!
//! # Main Components
//!
//! - **Request building**: URL merging, header overlays, JSON or multipart bodies
//! - **Authentication**: API-key or bearer credentials, resolved per request
//! - **Retries**: bounded exponential backoff with jitter on 408/409/429 and
//!   transport failures
//! - **Error mapping**: every failure surfaces as one [`Error`] variant
//! - **Decoding**: JSON, text, bytes, raw responses and server-sent event streams
//! - **Clients**: [`Dial`] (async) and, with the `blocking` feature,
//!   [`blocking::Dial`], which share one executor
//!
//! # Example
//!
//! ```no_run
//! use dial_core::{ChatCompletionRequest, Dial, Message};
//! use futures::StreamExt;
//!
//! # async fn example() -> dial_core::Result<()> {
//! let client = Dial::builder()
//!     .base_url("https://dial.example.com")
//!     .api_key("secret")
//!     .build()?;
//!
//! let request = ChatCompletionRequest::new(vec![Message::user("Tell me a joke")]);
//! let mut stream = client.chat().completions().create_stream("gpt-4o", &request).await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content().unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod http;
pub mod resources;
pub mod types;

#[cfg(feature = "blocking")]
pub mod blocking;

// Re-export main types for convenience
pub use client::{ClientBuilder, Dial};
pub use error::{ApiError, Error, Result};
pub use http::{
    AuthScheme, ChunkStream, ClientConfig, Credential, FilePart, PoolConfig, RequestOptions,
    RetryPolicy, TimeoutConfig,
};
pub use types::{
    Application, Bucket, ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, Choice,
    ChunkChoice, Delta, Deployment, FileMetadata, Message, ResponseMessage, Role, Usage,
};
pub use resources::{CompletionOptions, Download};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
