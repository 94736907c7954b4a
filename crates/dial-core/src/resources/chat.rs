//! Chat completions

use serde_json::{Map, Value};

use crate::http::{ChunkStream, HttpClient, RequestOptions};
use crate::resources::path_segment;
use crate::types::{ChatCompletion, ChatCompletionChunk, ChatCompletionRequest};
use crate::{Error, Result};

/// Entry point for chat endpoints
#[derive(Debug, Clone, Copy)]
pub struct Chat<'a> {
    http: &'a HttpClient,
    api_version: Option<&'a str>,
}

impl<'a> Chat<'a> {
    pub(crate) fn new(http: &'a HttpClient, api_version: Option<&'a str>) -> Self {
        Self { http, api_version }
    }

    pub fn completions(&self) -> Completions<'a> {
        Completions {
            http: self.http,
            api_version: self.api_version,
        }
    }
}

/// Per-call additions to a completion request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    /// Sent as the `api-version` query parameter, over the client default
    pub api_version: Option<String>,
    /// Added after the auth headers; a same-named header is replaced
    pub extra_headers: Vec<(String, String)>,
    /// Merged into the JSON body; a same-named field is replaced
    pub extra_body: Map<String, Value>,
}

impl CompletionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    pub fn body_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra_body.insert(name.into(), value);
        self
    }
}

/// `openai/deployments/{deployment}/chat/completions`
///
/// Applications are addressed the same way, with their id as `deployment`.
#[derive(Debug, Clone, Copy)]
pub struct Completions<'a> {
    http: &'a HttpClient,
    api_version: Option<&'a str>,
}

impl Completions<'_> {
    /// Request a complete answer in one response
    pub async fn create(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion> {
        self.create_with(deployment, request, &CompletionOptions::default())
            .await
    }

    /// [`create`](Self::create) with per-call options
    pub async fn create_with(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
        extra: &CompletionOptions,
    ) -> Result<ChatCompletion> {
        let options = completion_options(deployment, request, false, extra, self.api_version)?;
        self.http.json(&options, None).await
    }

    /// Request an answer as a stream of incremental chunks
    pub async fn create_stream(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
    ) -> Result<ChunkStream<ChatCompletionChunk>> {
        self.create_stream_with(deployment, request, &CompletionOptions::default())
            .await
    }

    /// [`create_stream`](Self::create_stream) with per-call options
    pub async fn create_stream_with(
        &self,
        deployment: &str,
        request: &ChatCompletionRequest,
        extra: &CompletionOptions,
    ) -> Result<ChunkStream<ChatCompletionChunk>> {
        let options = completion_options(deployment, request, true, extra, self.api_version)?;
        self.http.stream(&options, None).await
    }
}

pub(crate) fn completion_options(
    deployment: &str,
    request: &ChatCompletionRequest,
    stream: bool,
    extra: &CompletionOptions,
    default_api_version: Option<&str>,
) -> Result<RequestOptions> {
    let deployment = path_segment("deployment", deployment)?;

    let mut body: Value = serde_json::to_value(request).map_err(|e| Error::InvalidRequest {
        message: format!("Failed to serialize request: {}", e),
        param: None,
    })?;
    if let Value::Object(fields) = &mut body {
        fields.extend(extra.extra_body.clone());
    }
    body["stream"] = Value::Bool(stream);

    let mut options = RequestOptions::post(format!(
        "openai/deployments/{}/chat/completions",
        deployment
    ))
    .json(body);

    if let Some(version) = extra.api_version.as_deref().or(default_api_version) {
        options = options.query("api-version", version);
    }
    if stream {
        options = options.header("Accept", "text/event-stream");
    }
    for (name, value) in &extra.extra_headers {
        options = options.header(name.clone(), value.clone());
    }
    Ok(options)
}
