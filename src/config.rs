//! Configuration for the Media Activity Agent.

use crate::source::feed::DEFAULT_FEED_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which signal sources feed the normalizer
    pub sources: SourceConfig,

    /// Observations buffered between sources and the normalizer
    pub queue_capacity: usize,

    /// How emissions are written by `run`
    pub output_format: OutputFormat,

    /// Path for storing activity statistics
    pub data_path: PathBuf,

    /// Default tracing filter when `--verbose` is not given
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("media-activity-agent");

        Self {
            sources: SourceConfig::default(),
            queue_capacity: DEFAULT_FEED_CAPACITY,
            output_format: OutputFormat::default(),
            data_path: data_dir,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults if it is missing.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("media-activity-agent")
            .join("config.json")
    }

    /// Path of the persisted activity statistics.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("activity_stats.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }
}

/// Configuration for which signal sources are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub notification: bool,
    pub audio_session: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            notification: true,
            audio_session: true,
        }
    }
}

impl SourceConfig {
    /// Parse source configuration from a comma-separated string.
    pub fn from_csv(s: &str) -> Self {
        let sources: Vec<String> = s.split(',').map(|s| s.trim().to_lowercase()).collect();

        Self {
            notification: sources
                .iter()
                .any(|s| s == "notification" || s == "all"),
            audio_session: sources
                .iter()
                .any(|s| s == "audio-session" || s == "audio_session" || s == "all"),
        }
    }

    /// Check if at least one source is enabled.
    pub fn any_enabled(&self) -> bool {
        self.notification || self.audio_session
    }
}

/// Output format for emitted events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One bare `START`/`STOP` token per line
    #[default]
    Token,
    /// One JSON object per line with a timestamp
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "token" => Ok(OutputFormat::Token),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format '{other}' (expected token or json)")),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_config_parsing() {
        let config = SourceConfig::from_csv("notification,audio-session");
        assert!(config.notification);
        assert!(config.audio_session);

        let config = SourceConfig::from_csv("notification");
        assert!(config.notification);
        assert!(!config.audio_session);

        let config = SourceConfig::from_csv(" Audio_Session ");
        assert!(!config.notification);
        assert!(config.audio_session);

        let config = SourceConfig::from_csv("all");
        assert!(config.notification);
        assert!(config.audio_session);

        assert!(!SourceConfig::from_csv("microphone").any_enabled());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.queue_capacity, DEFAULT_FEED_CAPACITY);
        assert_eq!(config.output_format, OutputFormat::Token);
        assert!(config.sources.notification);
        assert!(config.sources.audio_session);
        assert!(config.stats_path().ends_with("activity_stats.json"));
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("token".parse::<OutputFormat>(), Ok(OutputFormat::Token));
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.sources.notification = false;
        config.queue_capacity = 16;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(!loaded.sources.notification);
        assert_eq!(loaded.queue_capacity, 16);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "output_format": "json" }"#).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.output_format, OutputFormat::Json);
        assert_eq!(loaded.queue_capacity, DEFAULT_FEED_CAPACITY);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
