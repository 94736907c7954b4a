//! HTTP error classification and normalization
//!
//! Maps a failed gateway response into the closed [`Error`] taxonomy. A
//! structured body of the form `{"error": {"message": ...}}` is used when
//! present; anything else falls back to the raw body text.

use std::sync::Arc;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ApiError, Error, DEFAULT_ERROR_TYPE};

/// Message used when the body was gone before it could be read
pub const STREAM_INTERRUPTED: &str = "Stream was interrupted";

/// A non-success response, with its body read up front
#[derive(Debug, Clone)]
pub struct FailedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// `None` when the body was closed or could not be read
    pub body: Option<String>,
}

impl FailedResponse {
    /// Drain the body of a failed response
    pub async fn read(response: reqwest::Response) -> Self {
        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(status = %status, error = %e, "Error body could not be read");
                None
            }
        };
        Self {
            status,
            headers,
            body,
        }
    }
}

/// Endpoint-specific mapping consulted before the default mapper
///
/// Returning `Some` takes precedence; `None` defers to [`ErrorMapper`].
pub type ErrorHook = Arc<dyn Fn(&FailedResponse) -> Option<Error> + Send + Sync>;

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
    param: Option<Value>,
    code: Option<Value>,
    display_message: Option<String>,
}

/// Default failed-response to [`Error`] mapping
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorMapper;

impl ErrorMapper {
    /// Map a failed response, consulting `hook` first when given
    pub fn map_with_hook(failed: &FailedResponse, hook: Option<&ErrorHook>) -> Error {
        if let Some(error) = hook.and_then(|hook| hook(failed)) {
            return error;
        }
        Self::map(failed)
    }

    /// Map a failed response using the gateway's error body conventions
    pub fn map(failed: &FailedResponse) -> Error {
        let status_code = failed.status.as_u16();

        let body = match &failed.body {
            Some(body) => body,
            None => return ApiError::new(STREAM_INTERRUPTED, status_code).into(),
        };

        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self::from_body(status_code, envelope.error).into(),
            Err(e) => {
                tracing::trace!(error = %e, "Error body is not structured, using raw text");
                ApiError::new(body.clone(), status_code).into()
            }
        }
    }

    fn from_body(status_code: u16, body: ErrorBody) -> ApiError {
        ApiError {
            message: body.message,
            status_code,
            error_type: body
                .error_type
                .unwrap_or_else(|| DEFAULT_ERROR_TYPE.to_string()),
            param: body.param.and_then(value_to_string),
            code: body.code.and_then(value_to_string),
            display_message: body.display_message,
        }
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(status: u16, body: Option<&str>) -> FailedResponse {
        FailedResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.map(str::to_string),
        }
    }

    #[test]
    fn test_structured_error_body() {
        let err = ErrorMapper::map(&failed(400, Some(r#"{"error": {"message": "bad thing"}}"#)));
        assert_eq!(err.to_string(), "bad thing");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_type(), "runtime_error");
    }

    #[test]
    fn test_structured_error_all_fields() {
        let body = r#"{"error": {
            "message": "Rate limit exceeded",
            "type": "rate_limit_error",
            "param": "messages",
            "code": 42,
            "display_message": "Please slow down"
        }}"#;
        let err = ErrorMapper::map(&failed(429, Some(body)));

        assert_eq!(err.status_code(), 429);
        assert_eq!(err.error_type(), "rate_limit_error");
        assert_eq!(err.param(), Some("messages"));
        assert_eq!(err.code(), Some("42"));
        assert_eq!(err.display_message(), Some("Please slow down"));
    }

    #[test]
    fn test_closed_body() {
        let err = ErrorMapper::map(&failed(502, None));
        assert_eq!(err.to_string(), "Stream was interrupted");
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_missing_message_falls_back_to_raw_text() {
        let body = r#"{"error": {"type": "oops"}}"#;
        let err = ErrorMapper::map(&failed(500, Some(body)));
        assert_eq!(err.to_string(), body);
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_plain_text_body() {
        let err = ErrorMapper::map(&failed(503, Some("Service Unavailable")));
        assert_eq!(err.to_string(), "Service Unavailable");
        assert_eq!(err.status_code(), 503);
        assert_eq!(err.error_type(), "runtime_error");
    }

    #[test]
    fn test_hook_takes_precedence() {
        let hook: ErrorHook = Arc::new(|failed| {
            (failed.status == StatusCode::PRECONDITION_FAILED).then(|| Error::EtagMismatch {
                message: "etag mismatch".to_string(),
            })
        });

        let err = ErrorMapper::map_with_hook(&failed(412, Some("{}")), Some(&hook));
        assert!(matches!(err, Error::EtagMismatch { .. }));

        // Hook declines, default mapping applies
        let err = ErrorMapper::map_with_hook(&failed(400, Some("nope")), Some(&hook));
        assert!(matches!(err, Error::Api(_)));
        assert_eq!(err.to_string(), "nope");
    }
}
