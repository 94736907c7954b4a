//! Error types and handling for the CLI
//!
//! This module provides error types and utilities for handling
//! various failure modes in the chat application.

use std::io;
use std::path::PathBuf;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (terminal, config files)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error from the gateway client
    #[error("{0}")]
    Core(#[from] dial_core::Error),

    /// Config file passed explicitly but missing
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The gateway answered without any choice
    #[error("No choices in response found")]
    NoChoices,

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Core(dial_core::Error::Configuration { .. }) => 5,
            Self::Core(_) => 2,
            Self::FileNotFound { .. } => 3,
            Self::Config(_) => 5,
            Self::NoChoices => 6,
            Self::Json(_) => 12,
            Self::Yaml(_) => 13,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Core(dial_core::Error::Configuration { .. })
        )
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    let mut text = error.to_string();

    if let Error::Core(core) = error {
        text = format!("{} (status {}, {})", text, core.status_code(), core.error_type());
        if let Some(hint) = core.display_message() {
            text = format!("{}\n  {}", text, hint);
        }
    }

    if use_color {
        use colored::Colorize;
        format!("{} {}", "Error:".red().bold(), text)
    } else {
        format!("Error: {}", text)
    }
}
