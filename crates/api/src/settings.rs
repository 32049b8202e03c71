//! Server settings
//!
//! Layered from an optional `parking-monitor.toml` and `PARKING__*`
//! environment variables, e.g. `PARKING__SERVER__BIND_ADDR=0.0.0.0:8080`.

use config::{Config, ConfigError, Environment, File};
use detection_loop::LoopConfig;
use occupancy::OccupancyConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::rate_limit::RateLimitConfig;

/// Default settings file name (extension resolved by `config`)
pub const SETTINGS_FILE: &str = "parking-monitor";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PARKING";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub storage: StorageSettings,
    /// Source bound at startup, if any
    pub source: Option<PathBuf>,
    pub rate_limit: RateLimitSettings,
    pub occupancy: OccupancyConfig,
    pub detection: LoopConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: String,
    /// Largest accepted request body (uploads and single frames)
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            max_body_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `trace`, `debug`, `info`, `warn` or `error`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Persisted region list
    pub regions_file: PathBuf,
    /// Where uploaded sources are written
    pub uploads_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            regions_file: PathBuf::from("parking_spaces.json"),
            uploads_dir: PathBuf::from("uploads"),
        }
    }
}

/// Limiter on the single-frame endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub per_second: u64,
    pub burst_size: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let limits = RateLimitConfig::default();
        Self {
            enabled: false,
            per_second: limits.per_second,
            burst_size: limits.burst_size,
        }
    }
}

impl RateLimitSettings {
    /// Limiter parameters, `None` when disabled
    pub fn limits(&self) -> Option<RateLimitConfig> {
        self.enabled.then(|| RateLimitConfig {
            per_second: self.per_second,
            burst_size: self.burst_size,
        })
    }
}

impl Settings {
    /// Load from the default file name and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(SETTINGS_FILE)
    }

    /// Load from `file` (optional, any format `config` understands) and the environment
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.bind_addr, "0.0.0.0:5000");
        assert_eq!(settings.storage.regions_file, PathBuf::from("parking_spaces.json"));
        assert!(settings.source.is_none());
        assert!(settings.rate_limit.limits().is_none());
        assert_eq!(settings.occupancy.free_threshold, occupancy::DEFAULT_FREE_THRESHOLD);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");
        std::fs::write(
            &path,
            r#"
source = "lot.mjpeg"

[server]
bind_addr = "127.0.0.1:9000"

[occupancy]
free_threshold = 750

[detection]
looping = false

[rate_limit]
enabled = true
burst_size = 3
"#,
        )
        .unwrap();

        let stem = dir.path().join("monitor");
        let settings = Settings::load_from(stem.to_str().unwrap()).unwrap();
        assert_eq!(settings.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(settings.source, Some(PathBuf::from("lot.mjpeg")));
        assert_eq!(settings.occupancy.free_threshold, 750);
        assert_eq!(settings.occupancy.region_width, occupancy::DEFAULT_REGION_WIDTH);
        assert!(!settings.detection.looping);

        let limits = settings.rate_limit.limits().unwrap();
        assert_eq!(limits.burst_size, 3);
        assert_eq!(limits.per_second, RateLimitConfig::default().per_second);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load_from("/nonexistent/parking-monitor").unwrap();
        assert_eq!(settings.storage.uploads_dir, PathBuf::from("uploads"));
    }
}
