use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::ReleasePolicy;

/// Settings for a capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Substring matched against input port names
    pub device_name: String,
    /// Client name announced to the MIDI driver
    pub client_name: String,
    /// Longest a single device read may block; bounds how long `stop` takes
    pub poll_interval_ms: u64,
    pub release_policy: ReleasePolicy,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_name: "UM-ONE".to_string(),
            client_name: "midicap".to_string(),
            poll_interval_ms: 50,
            release_policy: ReleasePolicy::Drop,
        }
    }
}

impl CaptureConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration manager for capture settings
/// Settings are persisted as JSON, by default in midicap.json in the working directory
pub struct ConfigManager {
    config_path: PathBuf,
    config: CaptureConfig,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub device_name: ConfigOption<String>,
    pub client_name: ConfigOption<String>,
    pub poll_interval_ms: ConfigOption<u64>,
    pub release_policy: ConfigOption<ReleasePolicy>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: CaptureConfig,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'midicap.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("midicap.json"));

        Self {
            config_path,
            config: CaptureConfig::default(),
        }
    }

    /// Load settings from the configuration file
    /// Writes and returns the defaults if the file doesn't exist yet
    pub fn load(&mut self) -> Result<CaptureConfig, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match application version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate(&config_file.settings).map_err(ConfigError::ValidationError)?;

        self.config = config_file.settings;
        Ok(self.config.clone())
    }

    /// Save current settings to the configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.config.clone(),
            created_at: now.clone(),
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        fs::write(&self.config_path, content)
            .map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Validate, update and save settings
    pub fn update(&mut self, config: CaptureConfig) -> Result<(), ConfigError> {
        Self::validate(&config).map_err(ConfigError::ValidationError)?;
        self.config = config;
        self.save()
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = CaptureConfig::default();
        ConfigSchema {
            device_name: ConfigOption {
                default: defaults.device_name,
                valid_range: None,
                valid_choices: None, // Populated from port enumeration at runtime
                description: "MIDI input device, matched as a substring of the port name"
                    .to_string(),
            },
            client_name: ConfigOption {
                default: defaults.client_name,
                valid_range: None,
                valid_choices: None,
                description: "Client name announced to the MIDI driver".to_string(),
            },
            poll_interval_ms: ConfigOption {
                default: defaults.poll_interval_ms,
                valid_range: Some((1, 1000)),
                valid_choices: None,
                description: "Maximum wait per device read in milliseconds".to_string(),
            },
            release_policy: ConfigOption {
                default: defaults.release_policy,
                valid_range: None,
                valid_choices: Some(vec![ReleasePolicy::Drop, ReleasePolicy::Error]),
                description: "Handling of a key release with no pending press".to_string(),
            },
        }
    }

    /// Validate settings against the schema, collecting every violation
    pub fn validate(config: &CaptureConfig) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        if config.device_name.trim().is_empty() {
            errors.push("device_name must not be empty".to_string());
        }

        if config.client_name.trim().is_empty() {
            errors.push("client_name must not be empty".to_string());
        }

        if let Some((min, max)) = schema.poll_interval_ms.valid_range {
            if config.poll_interval_ms < min || config.poll_interval_ms > max {
                errors.push(format!(
                    "poll_interval_ms must be between {} and {}",
                    min, max
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(String),
    #[error("Failed to serialize config: {0}")]
    SerializeError(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    ValidationError(Vec<String>),
}
