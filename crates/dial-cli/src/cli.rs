//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::Parser;
use std::path::PathBuf;

/// DIAL chat - interactive conversation with a DIAL gateway deployment
///
/// Type a question at the `>` prompt; type `exit` or press Ctrl-D to quit.
#[derive(Parser, Debug)]
#[command(name = "dial-chat", version, author, about, long_about = None)]
pub struct Cli {
    /// Deployment to chat with [default: gpt-4o]
    #[arg(short, long, env = "DIAL_DEPLOYMENT")]
    pub deployment: Option<String>,

    /// Stream the answer as it is generated (default)
    #[arg(long, overrides_with = "no_stream")]
    pub stream: bool,

    /// Wait for the complete answer instead of streaming
    #[arg(long, overrides_with = "stream")]
    pub no_stream: bool,

    /// System prompt; skips the interactive question
    #[arg(long, value_name = "PROMPT")]
    pub system_prompt: Option<String>,

    /// Gateway URL
    #[arg(long, env = "DIAL_URL", value_name = "URL")]
    pub base_url: Option<String>,

    /// API key
    #[arg(long, env = "DIAL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Bearer token, instead of an API key
    #[arg(long, env = "DIAL_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// Retries per request after the first attempt
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// `api-version` query parameter for completions
    #[arg(long, env = "DIAL_API_VERSION", value_name = "VERSION")]
    pub api_version: Option<String>,

    /// Enable verbose logging (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors and hide the progress spinner
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "DIAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::env::var("NO_COLOR").is_err()
    }

    /// Streaming choice given on the command line, if any
    pub fn stream_override(&self) -> Option<bool> {
        if self.no_stream {
            Some(false)
        } else if self.stream {
            Some(true)
        } else {
            None
        }
    }
}
