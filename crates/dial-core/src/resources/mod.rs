//! Endpoint resources built on the request executor
//!
//! Each resource only describes its requests (URL, body, target shape and,
//! for storage, an error hook); retries, auth and decoding are left to
//! [`HttpClient`](crate::http::HttpClient).

pub mod applications;
pub mod chat;
pub mod deployments;
pub mod files;

pub use applications::Applications;
pub use chat::{Chat, CompletionOptions, Completions};
pub use deployments::Deployments;
pub use files::{Download, Files};

use crate::{Error, Result};

/// Check a name that becomes one segment of an endpoint path
///
/// Empty names and names that would change the path, the query or the
/// fragment fail with [`Error::InvalidRequest`] naming `param`.
pub(crate) fn path_segment<'n>(param: &str, name: &'n str) -> Result<&'n str> {
    if name.is_empty() || name.contains(['/', '?', '#']) {
        return Err(Error::InvalidRequest {
            message: format!("Invalid {} name: '{}'", param, name),
            param: Some(param.to_string()),
        });
    }
    Ok(name)
}
