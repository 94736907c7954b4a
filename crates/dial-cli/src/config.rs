//! Configuration management for the CLI
//!
//! Settings are layered, later layers winning:
//! - Default values
//! - Configuration files (YAML/JSON)
//! - Environment variables (`.env` is loaded first) and command-line
//!   arguments, both resolved by clap

use crate::cli::Cli;
use crate::error::{Error, Result};
use dial_core::ClientBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deployment used when none is configured
pub const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// System prompt used when the user skips it
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Gateway root URL
    pub base_url: Option<String>,

    /// API key, sent in the `Api-Key` header
    pub api_key: Option<String>,

    /// Bearer token, alternative to the API key
    pub bearer_token: Option<String>,

    /// Deployment to chat with
    pub deployment: String,

    /// Stream responses as they are generated
    pub stream: bool,

    /// System prompt; asked interactively when unset
    pub system_prompt: Option<String>,

    /// Retries per request after the first attempt
    pub max_retries: Option<u32>,

    /// Per-attempt timeout in seconds
    pub timeout: Option<u64>,

    /// `api-version` sent with every completion
    pub api_version: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            bearer_token: None,
            deployment: DEFAULT_DEPLOYMENT.to_string(),
            stream: true,
            system_prompt: None,
            max_retries: None,
            timeout: None,
            api_version: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;

        let extension = path.extension().and_then(|s| s.to_str());
        let config = if matches!(extension, Some("yaml") | Some("yml")) {
            serde_yaml::from_str(&content)?
        } else {
            serde_json::from_str(&content)?
        };

        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        for path in Self::default_config_paths() {
            if path.exists() {
                match Self::from_file(&path) {
                    Ok(config) => {
                        tracing::debug!(path = %path.display(), "Loaded configuration file");
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to load config");
                    }
                }
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file or default locations
    pub fn load_with_file(file: Option<&Path>) -> Result<Self> {
        if let Some(path) = file {
            Self::from_file(path)
        } else {
            Self::load()
        }
    }

    /// Get default configuration file paths to check
    fn default_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".dial.yaml"), PathBuf::from(".dial.json")];

        if let Some(config_dir) = dirs::config_dir() {
            let dial_dir = config_dir.join("dial");
            paths.push(dial_dir.join("config.yaml"));
            paths.push(dial_dir.join("config.json"));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.push(home_dir.join(".dial.yaml"));
        }

        paths
    }

    /// Overlay environment and command-line values
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(base_url) = &cli.base_url {
            self.base_url = Some(base_url.clone());
        }
        // A credential from the command line replaces both file credentials.
        if cli.api_key.is_some() || cli.bearer_token.is_some() {
            self.api_key = cli.api_key.clone();
            self.bearer_token = cli.bearer_token.clone();
        }
        if let Some(deployment) = &cli.deployment {
            self.deployment = deployment.clone();
        }
        if let Some(stream) = cli.stream_override() {
            self.stream = stream;
        }
        if let Some(prompt) = &cli.system_prompt {
            self.system_prompt = Some(prompt.clone());
        }
        if let Some(max_retries) = cli.max_retries {
            self.max_retries = Some(max_retries);
        }
        if let Some(timeout) = cli.timeout {
            self.timeout = Some(timeout);
        }
        if let Some(version) = &cli.api_version {
            self.api_version = Some(version.clone());
        }
    }

    /// Prepare a gateway client builder from these settings
    pub fn client_builder(&self) -> Result<ClientBuilder> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            Error::config("No gateway URL configured. Set --base-url or DIAL_URL")
        })?;

        let mut builder = ClientBuilder::new().base_url(base_url);
        if let Some(key) = &self.api_key {
            builder = builder.api_key(key.as_str());
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_token(token.as_str());
        }
        if let Some(max_retries) = self.max_retries {
            builder = builder.max_retries(max_retries);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        if let Some(version) = &self.api_version {
            builder = builder.api_version(version.as_str());
        }
        Ok(builder)
    }
}
