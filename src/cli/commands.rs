use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::ConsoleConfig;
use super::prompt::TerminalInteraction;
use super::session;
use crate::api::HttpApi;
use crate::storage::FilePreferences;
use crate::views::Router;

/// Open the interactive console against the configured backend
pub async fn run_session(config: ConsoleConfig, route: &str) -> Result<()> {
    let api = HttpApi::new(&config.api).context("Failed to set up the backend client")?;
    info!("Connecting to {}", config.api.base_url);

    let prefs_path = config
        .storage
        .preferences_path
        .clone()
        .unwrap_or_else(FilePreferences::default_path);
    let prefs = FilePreferences::open(prefs_path);

    let interaction = Arc::new(TerminalInteraction::new());
    let router = Router::new(
        Arc::new(api),
        interaction.clone(),
        Arc::new(prefs),
        Arc::new(config),
    );

    session::run(router, interaction, route).await
}

/// Show the effective configuration
pub fn show_config(config: &ConsoleConfig) -> Result<()> {
    println!("Configuration file: {}", ConsoleConfig::default_path().display());
    println!("{}", serde_yaml::to_string(config).context("Failed to serialize configuration")?);
    Ok(())
}

/// Write the default configuration file if there is none yet
pub fn init_config() -> Result<()> {
    let path = ConsoleConfig::default_path();
    if path.exists() {
        warn!("Configuration already exists at {}", path.display());
    } else {
        ConsoleConfig::default().save_to_file(&path)?;
    }
    println!("Configuration file: {}", path.display());
    Ok(())
}
