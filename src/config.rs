//! Engine Configuration
//!
//! Timing and capacity knobs, loadable from TOML. Every field has a default
//! so a partial (or empty) file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Length of one countdown second, in milliseconds
    pub timer_period_ms: u64,
    /// Default interval between location samples, in milliseconds
    pub location_interval_ms: u64,
    /// Events buffered per subscriber before the slowest one starts lagging
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timer_period_ms: 1000,
            location_interval_ms: 1000,
            event_capacity: 256,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer_period_ms == 0 {
            return Err(ConfigError::Invalid("timer_period_ms must be positive".to_string()));
        }
        if self.location_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "location_interval_ms must be positive".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid("event_capacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = EngineConfig::from_toml_str("location_interval_ms = 250").unwrap();
        assert_eq!(config.location_interval(), Duration::from_millis(250));
        assert_eq!(config.timer_period(), Duration::from_secs(1));
        assert_eq!(config.event_capacity, 256);

        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("timer_period_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("event_capacity = \"lots\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("engine.toml");
        std::fs::write(&path, "timer_period_ms = 500\nevent_capacity = 16\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.timer_period(), Duration::from_millis(500));
        assert_eq!(config.event_capacity, 16);

        assert!(matches!(
            EngineConfig::load(&temp_dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
