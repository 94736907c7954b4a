//! Error types for the DIAL client core
//!
//! Every failure a call can surface is one variant of [`Error`]. The set is
//! closed: the variants mirror the status codes the gateway uses, so callers
//! can match exhaustively or read the uniform accessors (`status_code`,
//! `error_type`, `param`, `code`, `display_message`).

use thiserror::Error;

/// Status code reported when no HTTP status is known.
pub const DEFAULT_STATUS_CODE: u16 = 500;

/// Type tag reported when the gateway does not name one.
pub const DEFAULT_ERROR_TYPE: &str = "runtime_error";

/// Structured error as reported by the gateway in
/// `{"error": {"message": ..., "type": ..., ...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
    pub status_code: u16,
    pub error_type: String,
    pub param: Option<String>,
    pub code: Option<String>,
    pub display_message: Option<String>,
}

impl ApiError {
    /// Create a generic error with the default type tag
    pub fn new(message: impl Into<String>, status_code: u16) -> Self {
        Self {
            message: message.into(),
            status_code,
            error_type: DEFAULT_ERROR_TYPE.to_string(),
            param: None,
            code: None,
            display_message: None,
        }
    }
}

/// Main error type for DIAL client operations
#[derive(Error, Debug)]
pub enum Error {
    /// Error response from the gateway, or a generic failure with a known status
    #[error("{}", .0.message)]
    Api(ApiError),

    /// Malformed caller input, detected before any network call
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        param: Option<String>,
    },

    /// The response body could not be decoded into the requested shape
    #[error("Failed to parse response: {message}")]
    Parsing {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Optimistic-concurrency conflict on a storage resource
    #[error("Etag mismatch: {message}")]
    EtagMismatch { message: String },

    /// The requested resource does not exist
    #[error("Resource not found: {message}")]
    ResourceNotFound { message: String },

    /// No response arrived within the per-attempt timeout, retries exhausted
    #[error("Request timed out")]
    Timeout {
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Connection-level failure (reset, DNS, TLS...), retries exhausted
    #[error("Connection error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Client construction was given inconsistent settings
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            param: None,
        }
    }

    /// Create a parsing error wrapping the underlying cause
    pub fn parsing(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Parsing {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// HTTP-equivalent status code of this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Api(api) => api.status_code,
            Self::InvalidRequest { .. } | Self::Configuration { .. } => 400,
            Self::Parsing { .. } => 422,
            Self::EtagMismatch { .. } => 412,
            Self::ResourceNotFound { .. } => 404,
            Self::Timeout { .. } => 408,
            Self::Transport { .. } => DEFAULT_STATUS_CODE,
        }
    }

    /// Machine-readable type tag
    pub fn error_type(&self) -> &str {
        match self {
            Self::Api(api) => &api.error_type,
            Self::InvalidRequest { .. } | Self::Configuration { .. } => "invalid_request_error",
            Self::Parsing { .. } => "parsing_error",
            Self::EtagMismatch { .. } => "etag_mismatch",
            Self::ResourceNotFound { .. } => "resource_not_found",
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "connection_error",
        }
    }

    /// Request parameter implicated in the failure, if any
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::Api(api) => api.param.as_deref(),
            Self::InvalidRequest { param, .. } => param.as_deref(),
            _ => None,
        }
    }

    /// Machine error code reported by the gateway
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api(api) => api.code.as_deref(),
            _ => None,
        }
    }

    /// Message intended for end users, if the gateway provided one
    pub fn display_message(&self) -> Option<&str> {
        match self {
            Self::Api(api) => api.display_message.as_deref(),
            _ => None,
        }
    }

    /// Human-readable message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Api(api) => &api.message,
            Self::InvalidRequest { message, .. }
            | Self::Parsing { message, .. }
            | Self::EtagMismatch { message }
            | Self::ResourceNotFound { message }
            | Self::Transport { message, .. }
            | Self::Configuration { message } => message,
            Self::Timeout { .. } => "Request timed out",
        }
    }
}

impl From<ApiError> for Error {
    fn from(err: ApiError) -> Self {
        Error::Api(err)
    }
}
