//! HTTP request builder for gateway calls
//!
//! Turns a declarative [`RequestOptions`] into a `reqwest::Request` against the
//! client's base URL. Relative URLs are merged onto the base path; absolute
//! URLs are used verbatim so callers can reach another host explicitly.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::{Error, Result};

/// One part of a multipart upload
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Form field name
    pub field: String,
    /// File name reported to the server
    pub file_name: String,
    pub content: Bytes,
    pub content_type: Option<String>,
}

impl FilePart {
    /// Create a part for the conventional `file` field
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            field: "file".to_string(),
            file_name: file_name.into(),
            content: content.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn to_part(&self) -> Result<Part> {
        let part = Part::bytes(self.content.to_vec()).file_name(self.file_name.clone());
        match &self.content_type {
            Some(content_type) => part.mime_str(content_type).map_err(|e| Error::InvalidRequest {
                message: format!("Invalid content type '{}': {}", content_type, e),
                param: Some(self.field.clone()),
            }),
            None => Ok(part),
        }
    }
}

/// Declarative description of one logical call
///
/// Built once per call with the chained setters and never mutated while the
/// call is in flight; retries rebuild the wire request from it.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    /// Absolute URL, or a path relative to the client's base URL
    pub url: String,
    pub params: Vec<(String, String)>,
    /// Header overlay; `None` removes a header, including an auth header
    pub headers: Vec<(String, Option<String>)>,
    pub json: Option<Value>,
    pub files: Option<Vec<FilePart>>,
    /// Overrides the client's retry budget for this call
    pub max_retries: Option<u32>,
    /// Overrides the client's per-attempt timeout for this call
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: Vec::new(),
            headers: Vec::new(),
            json: None,
            files: None,
            max_retries: None,
            timeout: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Suppress a header that would otherwise be sent
    pub fn without_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push((name.into(), None));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.get_or_insert_with(Vec::new).push(part);
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject descriptions that can never be sent
    pub fn validate(&self) -> Result<()> {
        let supported = [Method::GET, Method::PUT, Method::POST, Method::DELETE];
        if !supported.contains(&self.method) {
            return Err(Error::invalid_request(format!(
                "Unsupported HTTP method: {}",
                self.method
            )));
        }
        if self.json.is_some() && self.files.is_some() {
            return Err(Error::invalid_request(
                "A request can carry either a JSON body or file parts, not both",
            ));
        }
        Ok(())
    }
}

/// Merge `url` onto `base`
///
/// Absolute URLs are returned unchanged. Relative ones are appended to the
/// base path (leading slash of `url` dropped), and the trailing slash of the
/// result is stripped.
pub fn merge_url(base: &Url, url: &str) -> Result<Url> {
    if let Ok(absolute) = Url::parse(url) {
        if absolute.has_host() {
            return Ok(absolute);
        }
    }

    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (url, None),
    };

    let mut base_path = base.path().to_string();
    if !base_path.ends_with('/') {
        base_path.push('/');
    }
    let joined = format!("{}{}", base_path, path.trim_start_matches('/'));
    let joined = joined.trim_end_matches('/');

    let mut merged = base.clone();
    merged.set_path(if joined.is_empty() { "/" } else { joined });
    merged.set_query(query);
    Ok(merged)
}

/// Builder for wire requests against a fixed base URL
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    client: reqwest::Client,
    base_url: Url,
}

impl RequestBuilder {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the wire request for one attempt
    ///
    /// Auth headers go first, then the caller's overlay, so caller headers
    /// win on conflict. `timeout` bounds the whole exchange, body included;
    /// `None` leaves the request without a total deadline.
    pub fn build(
        &self,
        options: &RequestOptions,
        auth_headers: HashMap<String, String>,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Request> {
        options.validate()?;

        let url = merge_url(&self.base_url, &options.url)?;
        let headers = Self::merge_headers(auth_headers, &options.headers)?;

        let mut request = self
            .client
            .request(options.method.clone(), url)
            .headers(headers);

        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        if !options.params.is_empty() {
            request = request.query(&options.params);
        }

        if let Some(body) = &options.json {
            request = request.json(body);
        } else if let Some(files) = &options.files {
            let mut form = Form::new();
            for file in files {
                form = form.part(file.field.clone(), file.to_part()?);
            }
            request = request.multipart(form);
        }

        request.build().map_err(|e| Error::InvalidRequest {
            message: format!("Failed to build request: {}", e),
            param: None,
        })
    }

    fn merge_headers(
        auth_headers: HashMap<String, String>,
        overlay: &[(String, Option<String>)],
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in auth_headers {
            headers.insert(header_name(&name)?, header_value(&name, &value)?);
        }
        for (name, value) in overlay {
            let key = header_name(name)?;
            match value {
                Some(value) if !value.is_empty() => {
                    headers.insert(key, header_value(name, value)?);
                }
                _ => {
                    headers.remove(key);
                }
            }
        }
        Ok(headers)
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::InvalidRequest {
        message: format!("Invalid header name '{}': {}", name, e),
        param: Some(name.to_string()),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| Error::InvalidRequest {
        message: format!("Invalid value for header '{}': {}", name, e),
        param: Some(name.to_string()),
    })
}
