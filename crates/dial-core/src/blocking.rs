//! Blocking gateway client
//!
//! Runs the same request executor as [`crate::Dial`] on a private
//! current-thread Tokio runtime, blocking the calling thread for the request
//! and for backoff sleeps. Retry, error mapping and decoding behave exactly as
//! in the async client.
//!
//! The blocking client must not be created, used or dropped from within an
//! async runtime.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::runtime::Runtime;

use crate::client::ClientBuilder;
use crate::http::{ChunkStream, ClientConfig, FilePart, HttpClient};
use crate::resources::CompletionOptions;
use crate::types::{
    Application, Bucket, ChatCompletion, ChatCompletionChunk, ChatCompletionRequest, Deployment,
    FileMetadata,
};
use crate::{Error, Result};

/// Blocking client for a DIAL gateway
#[derive(Clone)]
pub struct Dial {
    runtime: Arc<Runtime>,
    inner: crate::Dial,
}

impl Dial {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Create a client from a validated configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Configuration {
                message: format!("Failed to start blocking runtime: {}", e),
            })?;
        Ok(Self {
            runtime: Arc::new(runtime),
            inner: crate::Dial::new(config)?,
        })
    }

    pub fn chat(&self) -> Chat<'_> {
        Chat { client: self }
    }

    pub fn deployments(&self) -> Deployments<'_> {
        Deployments { client: self }
    }

    pub fn applications(&self) -> Applications<'_> {
        Applications { client: self }
    }

    pub fn files(&self) -> Files<'_> {
        Files { client: self }
    }

    pub fn http(&self) -> &HttpClient {
        self.inner.http()
    }

    /// Drive an executor future to completion on the private runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

impl fmt::Debug for Dial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::Dial")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chat<'a> {
    client: &'a Dial,
}

impl<'a> Chat<'a> {
    pub fn completions(&self) -> Completions<'a> {
        Completions {
            client: self.client,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Completions<'a> {
    client: &'a Dial,
}

impl Completions<'_> {
    pub fn create(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion> {
        self.create_with(deployment, request, &CompletionOptions::default())
    }

    pub fn create_with(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
        extra: &CompletionOptions,
    ) -> Result<ChatCompletion> {
        let completions = self.client.inner.chat().completions();
        self.client
            .block_on(completions.create_with(deployment, request, extra))
    }

    /// Open a streaming completion; chunks are read as the iterator advances
    pub fn create_stream(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
    ) -> Result<BlockingChunkStream<ChatCompletionChunk>> {
        self.create_stream_with(deployment, request, &CompletionOptions::default())
    }

    pub fn create_stream_with(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
        extra: &CompletionOptions,
    ) -> Result<BlockingChunkStream<ChatCompletionChunk>> {
        let completions = self.client.inner.chat().completions();
        let stream = self
            .client
            .block_on(completions.create_stream_with(deployment, request, extra))?;
        Ok(BlockingChunkStream {
            runtime: Arc::clone(&self.client.runtime),
            inner: stream,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Deployments<'a> {
    client: &'a Dial,
}

impl Deployments<'_> {
    pub fn list(&self) -> Result<Vec<Deployment>> {
        self.client.block_on(self.client.inner.deployments().list())
    }

    pub fn get(&self, name: &str) -> Result<Deployment> {
        self.client.block_on(self.client.inner.deployments().get(name))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Applications<'a> {
    client: &'a Dial,
}

impl Applications<'_> {
    pub fn list(&self) -> Result<Vec<Application>> {
        self.client.block_on(self.client.inner.applications().list())
    }

    pub fn get(&self, id: &str) -> Result<Application> {
        self.client.block_on(self.client.inner.applications().get(id))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Files<'a> {
    client: &'a Dial,
}

impl Files<'_> {
    pub fn bucket(&self) -> Result<Bucket> {
        self.client.block_on(self.client.inner.files().bucket())
    }

    pub fn upload(&self, path: &str, file: FilePart, etag: Option<&str>) -> Result<FileMetadata> {
        self.client
            .block_on(self.client.inner.files().upload(path, file, etag))
    }

    pub fn upload_new(&self, path: &str, file: FilePart) -> Result<FileMetadata> {
        self.client
            .block_on(self.client.inner.files().upload_new(path, file))
    }

    /// Download a whole file, only if `etag` still matches when given
    pub fn download(&self, path: &str, etag: Option<&str>) -> Result<Bytes> {
        self.client
            .block_on(self.client.inner.files().download_bytes(path, etag))
    }

    pub fn delete(&self, path: &str, etag: Option<&str>) -> Result<()> {
        self.client
            .block_on(self.client.inner.files().delete(path, etag))
    }

    pub fn metadata(&self, path: &str) -> Result<FileMetadata> {
        self.client.block_on(self.client.inner.files().metadata(path))
    }
}

/// Blocking view of a [`ChunkStream`]
///
/// Each call to `next` blocks until the next chunk arrives. Dropping the
/// iterator releases the connection.
pub struct BlockingChunkStream<T> {
    runtime: Arc<Runtime>,
    inner: ChunkStream<T>,
}

impl<T> Iterator for BlockingChunkStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.inner.next())
    }
}

impl<T> fmt::Debug for BlockingChunkStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingChunkStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_blocking_client() {
        let client = Dial::builder()
            .base_url("https://dial.example.com/api/")
            .bearer_token("t")
            .build_blocking()
            .unwrap();
        assert_eq!(client.http().base_url().path(), "/api/");
    }

    #[test]
    fn test_invalid_path_fails_before_network() {
        let client = Dial::builder()
            .base_url("http://127.0.0.1:9")
            .api_key("k")
            .build_blocking()
            .unwrap();
        let err = client.files().metadata("not-a-storage-path").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }
}
