//! Bridge configuration.
//!
//! Values come from [`BridgeConfig::default`], optionally overridden by a TOML file, and finally by
//! command line flags (see `main.rs`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Port name used when neither the config file nor the command line names one.
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Serial device the clock is attached to.
    pub port: String,
    pub baud: u32,
    /// Upper bound on a single read once the port reports pending bytes.
    pub read_timeout_ms: u64,
    /// Reader sleep between polls while monitoring.
    pub poll_interval_ms: u64,
    /// Reader sleep between mode checks while in settings, and after a read error.
    pub settings_poll_interval_ms: u64,
    /// Cadence of the consumer tick that drains decoded frames.
    pub tick_interval_ms: u64,
    pub queue_capacity: usize,
    /// How long `close` waits for the reader thread before closing the port anyway.
    pub shutdown_timeout_ms: u64,
}
impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_string(),
            baud: clocklink_common::BAUD_RATE,
            read_timeout_ms: 10,
            poll_interval_ms: 5,
            settings_poll_interval_ms: 10,
            tick_interval_ms: 50,
            queue_capacity: 64,
            shutdown_timeout_ms: 50,
        }
    }
}
impl BridgeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port.is_empty() {
            return Err(ConfigError::Invalid("port must not be empty"));
        }
        if self.baud == 0 {
            return Err(ConfigError::Invalid("baud must be nonzero"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be nonzero"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("tick_interval_ms must be nonzero"));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settings_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settings_poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = BridgeConfig::default();
        assert_eq!(c.baud, 9600);
        assert_eq!(c.tick_interval(), Duration::from_millis(50));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let c = BridgeConfig::from_toml_str(
            r#"
            port = "/dev/ttyACM1"
            queue_capacity = 8
            "#,
        )
        .unwrap();
        assert_eq!(c.port, "/dev/ttyACM1");
        assert_eq!(c.queue_capacity, 8);
        assert_eq!(c.baud, 9600);
        assert_eq!(c.poll_interval_ms, 5);
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            BridgeConfig::from_toml_str("baudrate = 9600"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        assert!(matches!(
            BridgeConfig::from_toml_str("queue_capacity = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = BridgeConfig::load(Path::new("/nonexistent/clocklink.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
