//! Configuration for the VitalPulse Monitor Agent.

use crate::monitor::MonitorProfile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the monitor agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interval between sample ticks
    #[serde(with = "duration_millis")]
    pub tick_interval: Duration,

    /// Interval between autosave snapshots
    #[serde(with = "duration_millis")]
    pub autosave_interval: Duration,

    /// Whether autosave snapshots are written
    pub autosave_enabled: bool,

    /// Run the classifier every this many ticks
    pub classify_every: u64,

    /// Maximum samples retained in the window
    pub window_capacity: usize,

    /// Threshold profile for alerting
    pub profile: MonitorProfile,

    /// Port for the HTTP surface
    pub server_port: u16,

    /// Remote record store, if configured; samples stay in memory otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_store: Option<RecordStoreConfig>,

    /// Path for autosave snapshot exports
    pub export_path: PathBuf,

    /// Path for state: device keys, session tokens, stats, snapshots
    pub data_path: PathBuf,
}

/// Remote record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStoreConfig {
    /// Base URL, e.g. `http://127.0.0.1:9000`
    pub base_url: String,
    /// Bearer authentication token
    pub token: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalpulse-monitor-agent");

        Self {
            tick_interval: Duration::from_millis(500),
            autosave_interval: Duration::from_secs(60),
            autosave_enabled: true,
            classify_every: 20,
            window_capacity: 50,
            profile: MonitorProfile::Standard,
            server_port: 8787,
            record_store: None,
            export_path: data_dir.join("exports"),
            data_path: data_dir,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalpulse-monitor-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Path of the device key registry.
    pub fn device_keys_path(&self) -> PathBuf {
        self.data_path.join("device_keys.json")
    }

    /// Path of the session token map.
    pub fn session_tokens_path(&self) -> PathBuf {
        self.data_path.join("session_tokens.json")
    }

    /// Path of the persisted activity counters.
    pub fn stats_path(&self) -> PathBuf {
        self.data_path.join("monitor_stats.json")
    }

    /// Directory holding autosave snapshots.
    pub fn snapshots_path(&self) -> PathBuf {
        self.data_path.join("autosave")
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration in milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.autosave_interval, Duration::from_secs(60));
        assert!(config.autosave_enabled);
        assert_eq!(config.classify_every, 20);
        assert_eq!(config.window_capacity, 50);
        assert_eq!(config.profile, MonitorProfile::Standard);
        assert!(config.record_store.is_none());
    }

    #[test]
    fn test_config_json_round_trip() {
        let mut config = Config::default();
        config.tick_interval = Duration::from_millis(250);
        config.record_store = Some(RecordStoreConfig {
            base_url: "http://127.0.0.1:9000".to_string(),
            token: "store-token".to_string(),
        });

        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.tick_interval, Duration::from_millis(250));
        assert_eq!(
            parsed.record_store.unwrap().base_url,
            "http://127.0.0.1:9000"
        );
    }

    #[test]
    fn test_state_paths_live_under_data_dir() {
        let config = Config::default();
        assert!(config.device_keys_path().starts_with(&config.data_path));
        assert!(config.stats_path().starts_with(&config.data_path));
        assert!(config.snapshots_path().starts_with(&config.data_path));
    }
}
