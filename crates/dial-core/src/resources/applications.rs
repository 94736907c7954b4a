//! Application listing

use crate::http::{HttpClient, RequestOptions};
use crate::resources::path_segment;
use crate::types::{Application, ApplicationList};
use crate::Result;

/// `openai/applications`
#[derive(Debug, Clone, Copy)]
pub struct Applications<'a> {
    http: &'a HttpClient,
}

impl<'a> Applications<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List the applications visible to the caller
    pub async fn list(&self) -> Result<Vec<Application>> {
        let list: ApplicationList = self
            .http
            .json(&RequestOptions::get("openai/applications"), None)
            .await?;
        Ok(list.data)
    }

    /// Fetch a single application by id
    pub async fn get(&self, id: &str) -> Result<Application> {
        let id = path_segment("application", id)?;
        self.http
            .json(&RequestOptions::get(format!("openai/applications/{}", id)), None)
            .await
    }
}
