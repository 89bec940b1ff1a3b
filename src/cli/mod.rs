pub mod commands;
pub mod config;
pub mod prompt;
pub mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use config::ConsoleConfig;

#[derive(Parser)]
#[command(author, version, about = "Terminal console for the marketplace monitor backend", long_about = None)]
pub struct Cli {
    /// Backend base URL, overrides the config file and MONITOR_API_URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file (verbose sessions default to the data directory)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an interactive console session
    Session {
        /// Route to open first (tasks, results, logs, settings)
        #[arg(default_value = "tasks")]
        route: String,
    },

    /// Show or initialise the configuration file
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        show: bool,
    },
}

/// Parse command line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Process the command
pub async fn process_command(cli: Cli, config: ConsoleConfig) -> Result<()> {
    match cli.command {
        Some(Commands::Session { route }) => {
            info!("Opening console on #{}", route);
            commands::run_session(config, &route).await
        }
        None => commands::run_session(config, "tasks").await,
        Some(Commands::Config { show }) => {
            if show {
                commands::show_config(&config)
            } else {
                commands::init_config()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert()
    }

    #[test]
    fn test_session_is_the_default() {
        let cli = Cli::try_parse_from(["console", "--base-url", "http://monitor:8000"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.base_url.as_deref(), Some("http://monitor:8000"));

        let cli = Cli::try_parse_from(["console", "session", "#logs", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Session { route }) if route == "#logs"));
    }
}
