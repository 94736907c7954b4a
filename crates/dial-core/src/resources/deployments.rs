//! Deployment listing

use crate::http::{HttpClient, RequestOptions};
use crate::resources::path_segment;
use crate::types::{Deployment, DeploymentList};
use crate::Result;

/// `openai/deployments`
#[derive(Debug, Clone, Copy)]
pub struct Deployments<'a> {
    http: &'a HttpClient,
}

impl<'a> Deployments<'a> {
    pub(crate) fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    /// List the deployments visible to the caller
    pub async fn list(&self) -> Result<Vec<Deployment>> {
        let list: DeploymentList = self
            .http
            .json(&RequestOptions::get("openai/deployments"), None)
            .await?;
        Ok(list.data)
    }

    /// Fetch a single deployment by name
    pub async fn get(&self, name: &str) -> Result<Deployment> {
        let name = path_segment("deployment", name)?;
        self.http
            .json(&RequestOptions::get(format!("openai/deployments/{}", name)), None)
            .await
    }
}
