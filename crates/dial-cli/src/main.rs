//! DIAL chat - interactive command-line chat against a DIAL gateway
//!
//! This is the main entry point for the `dial-chat` binary: it resolves the
//! configuration, builds a gateway client and runs the conversation loop on
//! the terminal.

mod chat;
mod cli;
mod config;
mod conversation;
mod error;
mod logging;

use chat::ChatSession;
use cli::Cli;
use colored::control;
use config::Config;
use error::Result;
use is_terminal::IsTerminal;
use logging::{current_request_id, redaction, LoggingConfig};
use std::process;
use tracing::Instrument;

#[tokio::main]
async fn main() {
    // `.env` feeds the env-backed arguments, so load it before parsing
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => {
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_with_file(cli.config.as_deref())?;
    config.apply_cli(&cli);

    if let Ok(mut effective) = serde_json::to_value(&config) {
        redaction::redact_json_value(&mut effective);
        tracing::debug!(config = %effective, "Resolved configuration");
    }

    let client = config.client_builder()?.build()?;
    let spinner = !cli.quiet && std::io::stdout().is_terminal();
    let session = ChatSession::new(&client, config.deployment.clone(), config.stream)
        .with_system_prompt(config.system_prompt.clone())
        .with_spinner(spinner);

    let span = tracing::info_span!(
        "chat_session",
        request_id = current_request_id().unwrap_or("unknown"),
        deployment = %config.deployment,
        stream = config.stream,
    );

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).instrument(span).await?;
    Ok(())
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());

    logging_config.merge_with_env();

    // If quiet mode, only log errors
    if cli.quiet {
        logging_config.level = "error".to_string();
        logging_config.console = false;
    }

    logging::init_logging(logging_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from(["dial-chat"]);
        assert_eq!(cli.verbosity_level(), 0);
        assert!(!cli.no_color);

        let cli = Cli::parse_from(["dial-chat", "-vvv", "--no-color"]);
        assert_eq!(cli.verbosity_level(), 3);
        assert!(!cli.use_color());
    }
}
