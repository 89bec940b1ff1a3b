use anyhow::{Result, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::fs;
use tracing::{info, debug};

/// Environment variable overriding the configured backend URL
pub const BASE_URL_ENV: &str = "MONITOR_API_URL";

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ConsoleConfig {
    pub api: ApiSettings,
    pub logs: LogSettings,
    pub tasks: TaskSettings,
    pub results: ResultSettings,
    pub storage: StorageSettings,
}

/// Backend connection settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: u64,
    /// AI-assisted task creation can take minutes
    pub generate_timeout_secs: u64,
}

/// Live log view settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    pub poll_interval_ms: u64,
    pub viewport_rows: usize,
    /// Rows from the bottom that still count as "at the bottom"
    pub scroll_tolerance: usize,
}

/// Task table settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TaskSettings {
    pub poll_interval_ms: u64,
}

/// Results browser settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ResultSettings {
    pub page_size: u32,
}

/// Durable client storage settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    /// Preferences file; the platform data directory is used when unset
    pub preferences_path: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            username: None,
            password: None,
            timeout_secs: 30,
            generate_timeout_secs: 180,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            viewport_rows: 30,
            scroll_tolerance: 5,
        }
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5000,
        }
    }
}

impl Default for ResultSettings {
    fn default() -> Self {
        Self { page_size: 100 }
    }
}

impl ConsoleConfig {
    /// Get the path to the config directory
    fn config_dir() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("com", "monitor-console", "monitor-console") {
            proj_dirs.config_dir().to_path_buf()
        } else {
            PathBuf::from("./config")
        }
    }

    /// Path of the default configuration file
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("default.yaml")
    }

    /// Load the default configuration, creating it on first use
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_path();

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            info!("Default configuration not found. Creating...");
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let contents = fs::read_to_string(path)
            .context(format!("Failed to read configuration file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .context(format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        debug!("Saving configuration to: {}", path.display());

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)
                    .context(format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let contents = serde_yaml::to_string(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, contents)
            .context(format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Apply the environment override and an explicit command-line URL, in that order
    pub fn with_overrides(mut self, env_url: Option<String>, cli_url: Option<String>) -> Self {
        if let Some(url) = env_url.filter(|u| !u.is_empty()) {
            self.api.base_url = url;
        }
        if let Some(url) = cli_url {
            self.api.base_url = url;
        }
        self
    }
}
