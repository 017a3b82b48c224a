//! Host configuration.
//!
//! Loaded from `cadence.toml`; every field is optional and falls back to its
//! default.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use cadence_audio::AudioConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "cadence.toml";

/// Which device backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Default system output through rodio.
    #[default]
    Rodio,
    /// Silent, deterministic channels.
    Virtual,
}

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per second of the host loop
    pub target_fps: u32,
    /// Feed the phases a constant delta instead of measured time
    pub fixed_dt: Option<f64>,
    /// Give up after this many seconds (looping files never finish)
    pub max_runtime_secs: f64,
    /// Device backend
    pub device: DeviceKind,
    /// Scheduler settings
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            fixed_dt: None,
            max_runtime_secs: 600.0,
            device: DeviceKind::default(),
            audio: AudioConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.target_fps = self.target_fps.clamp(10, 1000);
        self.fixed_dt = self.fixed_dt.map(|dt| dt.clamp(0.0001, 0.25));
        self.max_runtime_secs = self.max_runtime_secs.max(0.0);
        self.audio.validate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_audio::DistanceModel;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.target_fps, 60);
        assert_eq!(config.device, DeviceKind::Rodio);
        assert_eq!(config.audio.num_channels, 16);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.target_fps = 1;
        config.fixed_dt = Some(5.0);
        config.audio.num_channels = 0;

        config.validate();

        assert_eq!(config.target_fps, 10);
        assert_eq!(config.fixed_dt, Some(0.25));
        assert_eq!(config.audio.num_channels, 1);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join(CONFIG_FILE);

        let mut config = EngineConfig::default();
        config.device = DeviceKind::Virtual;
        config.fixed_dt = Some(0.01);
        config.audio = AudioConfig::default()
            .with_channels(8)
            .with_distance_model(DistanceModel::Linear)
            .with_search_path("assets/sfx");

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(
            &config_path,
            "device = \"virtual\"\n\n[audio]\nnum_channels = 4\n",
        )
        .expect("write");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.device, DeviceKind::Virtual);
        assert_eq!(loaded.audio.num_channels, 4);
        assert_eq!(loaded.target_fps, 60);
    }

    #[test]
    fn test_config_load_missing_or_broken_file() {
        let config = EngineConfig::load_from("/nonexistent/path/cadence.toml");
        assert_eq!(config, EngineConfig::default());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join(CONFIG_FILE);
        fs::write(&config_path, "target_fps = \"fast\"").expect("write");
        assert_eq!(EngineConfig::load_from(&config_path), EngineConfig::default());
    }
}
