//! File storage
//!
//! Paths are storage URLs of the form `files/<bucket>/<path>` (optionally
//! prefixed with `v1/`), or absolute URLs which are used verbatim. Storage
//! endpoints report optimistic-concurrency conflicts as 412 and missing
//! files as 404; both are mapped to dedicated error kinds.
//!
//! Writes and reads can be made conditional: `If-Match` with an etag, or
//! `If-None-Match: *` to create a file only when nothing is stored yet.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::{StatusCode, Url};

use crate::http::{ErrorHook, ErrorMapper, FailedResponse, FilePart, HttpClient, RequestOptions};
use crate::types::{Bucket, FileMetadata};
use crate::{Error, Result};

const FILES_PREFIX: &str = "files/";

/// `v1/files`, `v1/metadata` and `v1/bucket`
#[derive(Clone)]
pub struct Files<'a> {
    http: &'a HttpClient,
    hook: ErrorHook,
}

impl<'a> Files<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self {
            http,
            hook: storage_error_hook(),
        }
    }

    /// Bucket owned by the caller's credentials
    pub async fn bucket(&self) -> Result<Bucket> {
        self.http.json(&RequestOptions::get("v1/bucket"), None).await
    }

    /// Upload a file, replacing it only if `etag` still matches when given
    pub async fn upload(
        &self,
        path: &str,
        file: FilePart,
        etag: Option<&str>,
    ) -> Result<FileMetadata> {
        let options = if_match(RequestOptions::put(file_url(path)?).file(file), etag);
        self.http.json(&options, Some(&self.hook)).await
    }

    /// Upload a file only if nothing is stored at `path` yet
    ///
    /// An existing file fails the call with [`Error::EtagMismatch`].
    pub async fn upload_new(&self, path: &str, file: FilePart) -> Result<FileMetadata> {
        let options = RequestOptions::put(file_url(path)?)
            .file(file)
            .header("If-None-Match", "*");
        self.http.json(&options, Some(&self.hook)).await
    }

    /// Open a download, only if `etag` still matches when given
    ///
    /// The body is left unread.
    pub async fn download(&self, path: &str, etag: Option<&str>) -> Result<Download> {
        let file_name = file_name(path)?;
        let options = if_match(RequestOptions::get(file_url(path)?), etag);
        let response = self.http.send(&options, Some(&self.hook)).await?;
        Ok(Download {
            file_name,
            response,
        })
    }

    /// Download a whole file into memory, only if `etag` still matches when given
    pub async fn download_bytes(&self, path: &str, etag: Option<&str>) -> Result<Bytes> {
        file_name(path)?;
        let options = if_match(RequestOptions::get(file_url(path)?), etag);
        self.http.bytes(&options, Some(&self.hook)).await
    }

    /// Delete a file, only if `etag` still matches when given
    pub async fn delete(&self, path: &str, etag: Option<&str>) -> Result<()> {
        let options = if_match(RequestOptions::delete(file_url(path)?), etag);
        self.http.unit(&options, Some(&self.hook)).await
    }

    /// Metadata of a stored file
    pub async fn metadata(&self, path: &str) -> Result<FileMetadata> {
        let options = RequestOptions::get(metadata_url(path)?);
        self.http.json(&options, Some(&self.hook)).await
    }
}

/// An opened download
#[derive(Debug)]
pub struct Download {
    /// Last segment of the storage path
    pub file_name: String,
    /// Successful response with the body still unread
    pub response: reqwest::Response,
}

impl std::fmt::Debug for Files<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Files").field("http", self.http).finish_non_exhaustive()
    }
}

fn storage_error_hook() -> ErrorHook {
    Arc::new(|failed: &FailedResponse| {
        let message = || {
            let mapped = ErrorMapper::map(failed);
            mapped.message().to_string()
        };
        match failed.status {
            StatusCode::PRECONDITION_FAILED => Some(Error::EtagMismatch {
                message: non_empty(message(), "etag mismatch"),
            }),
            StatusCode::NOT_FOUND => Some(Error::ResourceNotFound {
                message: non_empty(message(), "resource not found"),
            }),
            _ => None,
        }
    })
}

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

fn if_match(options: RequestOptions, etag: Option<&str>) -> RequestOptions {
    match etag {
        Some(etag) => options.header("If-Match", etag),
        None => options,
    }
}

fn absolute(path: &str) -> Option<Url> {
    Url::parse(path).ok().filter(Url::has_host)
}

/// Storage path relative to the API root, without the `v1/` prefix
fn relative_storage_path(path: &str) -> Result<&str> {
    let relative = path.trim_start_matches('/');
    let relative = relative.strip_prefix("v1/").unwrap_or(relative);
    match relative.strip_prefix(FILES_PREFIX) {
        Some(rest) if !rest.is_empty() && rest.contains('/') => Ok(relative),
        _ => Err(Error::InvalidRequest {
            message: format!(
                "Malformed resource URL '{}': expected files/<bucket>/<path>",
                path
            ),
            param: Some("path".to_string()),
        }),
    }
}

fn file_url(path: &str) -> Result<String> {
    if absolute(path).is_some() {
        return Ok(path.to_string());
    }
    Ok(format!("v1/{}", relative_storage_path(path)?))
}

/// Name of the file a storage path points to
fn file_name(path: &str) -> Result<String> {
    let name = match absolute(path) {
        Some(url) => url.path().rsplit('/').next().unwrap_or_default().to_string(),
        None => relative_storage_path(path)?
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    if name.is_empty() {
        return Err(Error::InvalidRequest {
            message: "URL points to a directory, not a file".to_string(),
            param: Some("path".to_string()),
        });
    }
    Ok(name)
}

fn metadata_url(path: &str) -> Result<String> {
    if let Some(mut url) = absolute(path) {
        let rewritten = url.path().replacen("/v1/files/", "/v1/metadata/files/", 1);
        if rewritten == url.path() {
            return Err(Error::InvalidRequest {
                message: format!("Malformed resource URL '{}': no /v1/files/ segment", path),
                param: Some("path".to_string()),
            });
        }
        url.set_path(&rewritten);
        return Ok(url.to_string());
    }
    Ok(format!("v1/metadata/{}", relative_storage_path(path)?))
}
