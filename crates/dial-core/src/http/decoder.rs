//! Response decoding into caller-selected shapes
//!
//! The shape is chosen up front by the caller through [`Expect`]; the body is
//! never inspected to guess it.

use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http::stream::ChunkStream;
use crate::{Error, Result};

/// Target shape of a successful response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Hand back the undecoded response, e.g. for downloads
    Response,
    /// Whole body as bytes
    Bytes,
    /// Whole body as text
    Text,
    /// Discard the body
    Nothing,
    /// Parse the body as JSON into the target type
    Json,
    /// Server-sent events, each parsed into the target type
    EventStream,
}

/// A decoded successful response
pub enum Decoded<T> {
    Response(reqwest::Response),
    Bytes(Bytes),
    Text(String),
    Nothing,
    Json(T),
    Stream(ChunkStream<T>),
}

impl<T> Decoded<T> {
    /// Shape this value was decoded as
    pub fn shape(&self) -> Expect {
        match self {
            Self::Response(_) => Expect::Response,
            Self::Bytes(_) => Expect::Bytes,
            Self::Text(_) => Expect::Text,
            Self::Nothing => Expect::Nothing,
            Self::Json(_) => Expect::Json,
            Self::Stream(_) => Expect::EventStream,
        }
    }
}

impl<T> std::fmt::Debug for Decoded<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response(r) => f.debug_tuple("Response").field(&r.status()).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Text(t) => f.debug_tuple("Text").field(t).finish(),
            Self::Nothing => f.write_str("Nothing"),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Stream(s) => f.debug_tuple("Stream").field(s).finish(),
        }
    }
}

impl Expect {
    /// Whether the executor reads the whole body before decoding
    ///
    /// Buffered bodies are read inside the retry loop, so a failed read is
    /// retried like any other transport failure.
    pub fn is_buffered(self) -> bool {
        !matches!(self, Expect::Response | Expect::EventStream)
    }
}

/// A successful response as handed to [`decode`]
pub enum Received {
    /// Whole body, already read
    Buffered(Bytes),
    /// Body left for the caller or the event stream to read
    Unread(reqwest::Response),
}

/// Decode a successful response into the requested shape
///
/// `read_timeout` limits each read of an event stream.
pub fn decode<T>(
    expect: Expect,
    received: Received,
    read_timeout: Option<Duration>,
) -> Result<Decoded<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    match (expect, received) {
        (Expect::Response, Received::Unread(response)) => Ok(Decoded::Response(response)),
        (Expect::EventStream, Received::Unread(response)) => Ok(Decoded::Stream(match read_timeout {
            Some(limit) => ChunkStream::from_response_with_read_timeout(response, limit),
            None => ChunkStream::from_response(response),
        })),
        (Expect::Bytes, Received::Buffered(body)) => Ok(Decoded::Bytes(body)),
        (Expect::Text, Received::Buffered(body)) => {
            let text = String::from_utf8(body.to_vec())
                .map_err(|e| Error::parsing("Response body is not valid UTF-8", e))?;
            Ok(Decoded::Text(text))
        }
        (Expect::Nothing, Received::Buffered(_)) => Ok(Decoded::Nothing),
        (Expect::Json, Received::Buffered(body)) => Ok(Decoded::Json(parse_json(&body)?)),
        (expect, Received::Buffered(_)) => Err(Error::invalid_request(format!(
            "{:?} needs an unread response",
            expect
        ))),
        (expect, Received::Unread(_)) => Err(Error::invalid_request(format!(
            "{:?} needs a buffered body",
            expect
        ))),
    }
}

/// Parse a JSON document, then build the target type from it
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| Error::parsing("Response body is not valid JSON", e))?;
    serde_json::from_value(value).map_err(|e| {
        Error::parsing(
            format!(
                "Response does not match the expected {}",
                short_type_name::<T>()
            ),
            e,
        )
    })
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Thing {
        id: u32,
        name: String,
    }

    fn buffered(body: &'static str) -> Received {
        Received::Buffered(Bytes::from_static(body.as_bytes()))
    }

    fn unread(status: u16, body: &'static str) -> Received {
        let response: reqwest::Response = http::Response::builder()
            .status(status)
            .body(body)
            .unwrap()
            .into();
        Received::Unread(response)
    }

    #[test]
    fn test_decode_json() {
        let decoded =
            decode::<Thing>(Expect::Json, buffered(r#"{"id": 1, "name": "a"}"#), None).unwrap();
        match decoded {
            Decoded::Json(thing) => assert_eq!(thing, Thing { id: 1, name: "a".into() }),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_json_wrong_shape() {
        let err = decode::<Thing>(Expect::Json, buffered(r#"{"id": "x"}"#), None).unwrap_err();
        assert!(matches!(err, Error::Parsing { .. }));
        assert_eq!(err.status_code(), 422);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_decode_json_not_json() {
        let err = decode::<Thing>(Expect::Json, buffered("<html>"), None).unwrap_err();
        assert!(matches!(err, Error::Parsing { .. }));
    }

    #[test]
    fn test_decode_text_and_bytes() {
        let decoded = decode::<Value>(Expect::Text, buffered("hello"), None).unwrap();
        assert!(matches!(decoded, Decoded::Text(ref t) if t == "hello"));

        let decoded = decode::<Value>(Expect::Bytes, buffered("hi"), None).unwrap();
        assert!(matches!(decoded, Decoded::Bytes(ref b) if b.as_ref() == b"hi"));
    }

    #[test]
    fn test_decode_text_invalid_utf8() {
        let body = Received::Buffered(Bytes::from_static(&[0xff, 0xfe]));
        let err = decode::<Value>(Expect::Text, body, None).unwrap_err();
        assert!(matches!(err, Error::Parsing { .. }));
    }

    #[tokio::test]
    async fn test_decode_nothing_and_raw() {
        let decoded = decode::<Value>(Expect::Nothing, buffered(""), None).unwrap();
        assert_eq!(decoded.shape(), Expect::Nothing);

        let decoded = decode::<Value>(Expect::Response, unread(200, "raw"), None).unwrap();
        match decoded {
            Decoded::Response(r) => assert_eq!(r.text().await.unwrap(), "raw"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_buffered_shapes() {
        assert!(Expect::Json.is_buffered());
        assert!(Expect::Nothing.is_buffered());
        assert!(!Expect::Response.is_buffered());
        assert!(!Expect::EventStream.is_buffered());
    }

    #[test]
    fn test_mismatched_body_is_rejected() {
        let err = decode::<Value>(Expect::Response, buffered("x"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));

        let err = decode::<Value>(Expect::Json, unread(200, "{}"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Thing>(), "Thing");
    }
}
