use crate::models::config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory name under the platform config dir
const APP_DIR: &str = "vital-monitor";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to determine config directory")]
    NoConfigDir,
    #[error("Failed to create config directory: {0}")]
    CreateDir(String),
    #[error("Failed to read config file: {0}")]
    Read(String),
    #[error("Failed to write config file: {0}")]
    Write(String),
    #[error("Failed to parse config file: {0}")]
    Parse(String),
}

/// Configuration manager for app settings
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for the platform config directory
    ///
    /// This will create the config directory if it doesn't exist.
    pub fn new() -> Result<Self, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(APP_DIR);

        fs::create_dir_all(&config_dir).map_err(|e| ConfigError::CreateDir(e.to_string()))?;

        let config_path = config_dir.join("config.json");

        Ok(Self {
            config_dir,
            config_path,
        })
    }

    /// Use an explicit config file instead of the platform location
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        let config_path = path.into();
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Self {
            config_dir,
            config_path,
        }
    }

    /// Save configuration to disk
    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if !self.config_dir.as_os_str().is_empty() {
            fs::create_dir_all(&self.config_dir)
                .map_err(|e| ConfigError::CreateDir(e.to_string()))?;
        }

        // Pretty print for human editing
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Write(e.to_string()))?;

        fs::write(&self.config_path, json).map_err(|e| ConfigError::Write(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from disk
    ///
    /// If config file doesn't exist, returns default configuration
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        let config: AppConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Write the default configuration unless a file already exists
    ///
    /// Returns whether a file was written.
    pub fn init(&self) -> Result<bool, ConfigError> {
        if self.config_exists() {
            return Ok(false);
        }
        self.save(&AppConfig::default())?;
        Ok(true)
    }

    /// Get the config file path
    pub fn config_file_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Check if config file exists
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}
