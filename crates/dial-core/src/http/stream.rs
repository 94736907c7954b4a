//! Server-sent event streaming
//!
//! Reads a response body as a byte stream, splits it into SSE events
//! (`data: …\n\n`), and parses each event payload as JSON. The `[DONE]`
//! sentinel ends the stream. An optional read timeout bounds each wait for
//! more bytes, not the stream as a whole. The stream is one-pass: dropping it, drained or
//! not, releases the underlying connection.

use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Payload that terminates a completion stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Lazy, one-pass stream of decoded chunks
pub struct ChunkStream<T> {
    inner: Pin<Box<dyn Stream<Item = Result<T>> + Send>>,
}

impl<T> ChunkStream<T>
where
    T: DeserializeOwned + Send + 'static,
{
    /// Stream the body of a successful response
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::from_bytes_stream(response.bytes_stream())
    }

    /// Stream the body of a successful response, giving up with
    /// [`Error::Timeout`] when one read waits longer than `read_timeout`
    pub fn from_response_with_read_timeout(
        response: reqwest::Response,
        read_timeout: Duration,
    ) -> Self {
        Self::from_bytes_stream_with_read_timeout(response.bytes_stream(), read_timeout)
    }

    /// Parse SSE events out of any byte stream
    pub fn from_bytes_stream<S, E>(bytes: S) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_reader(EventReader::new(bytes, None))
    }

    /// Like [`ChunkStream::from_bytes_stream`], with a limit on each read
    pub fn from_bytes_stream_with_read_timeout<S, E>(bytes: S, read_timeout: Duration) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::from_reader(EventReader::new(bytes, Some(read_timeout)))
    }

    fn from_reader<S, E>(reader: EventReader<S, E>) -> Self
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let inner = stream::unfold(reader, |mut reader| async move {
            let payload = reader.next_payload().await?;
            let item = payload.and_then(|data| {
                serde_json::from_str::<T>(&data).map_err(|e| {
                    Error::parsing(format!("Failed to parse stream chunk: {}", data), e)
                })
            });
            Some((item, reader))
        });
        Self {
            inner: Box::pin(inner),
        }
    }
}

impl<T> ChunkStream<T> {
    /// Stop reading and release the connection
    pub fn close(self) {}
}

impl<T> Stream for ChunkStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<T> fmt::Debug for ChunkStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkStream").finish_non_exhaustive()
    }
}

/// Line-oriented SSE reader over a byte stream
struct EventReader<S, E> {
    bytes: Pin<Box<S>>,
    buffer: Vec<u8>,
    data: Vec<String>,
    read_timeout: Option<Duration>,
    eof: bool,
    finished: bool,
    _error: PhantomData<fn() -> E>,
}

impl<S, E> EventReader<S, E>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    fn new(bytes: S, read_timeout: Option<Duration>) -> Self {
        Self {
            bytes: Box::pin(bytes),
            buffer: Vec::new(),
            data: Vec::new(),
            read_timeout,
            eof: false,
            finished: false,
            _error: PhantomData,
        }
    }

    /// Next event payload; `None` once the stream is exhausted or `[DONE]`
    async fn next_payload(&mut self) -> Option<Result<String>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                let line = match std::str::from_utf8(&raw) {
                    Ok(line) => line.trim_end_matches(['\n', '\r']),
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(Error::parsing("Stream chunk is not valid UTF-8", e)));
                    }
                };

                if line.is_empty() {
                    if let Some(payload) = self.dispatch() {
                        return Some(Ok(payload));
                    }
                    if self.finished {
                        return None;
                    }
                } else if let Some(value) = line.strip_prefix("data:") {
                    let value = value.strip_prefix(' ').unwrap_or(value);
                    self.data.push(value.to_string());
                }
                // comments (":") and other fields are ignored
                continue;
            }

            if self.eof {
                let payload = self.dispatch();
                self.finished = true;
                return payload.map(Ok);
            }

            let next = match self.read_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.bytes.next()).await {
                    Ok(next) => next,
                    Err(elapsed) => {
                        self.finished = true;
                        return Some(Err(Error::Timeout {
                            source: Some(elapsed.into()),
                        }));
                    }
                },
                None => self.bytes.next().await,
            };

            match next {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(Error::Transport {
                        message: format!("stream read error: {}", e),
                        source: Some(e.into()),
                    }));
                }
                None => {
                    self.eof = true;
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                    }
                }
            }
        }
    }

    /// Complete the pending event; `[DONE]` marks the reader finished
    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        if payload.trim() == DONE_SENTINEL {
            self.finished = true;
            return None;
        }
        Some(payload)
    }
}
