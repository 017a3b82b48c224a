//! Scheduler configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::spatial::DistanceModel;

/// Default number of hardware channels.
pub const DEFAULT_CHANNELS: usize = 16;

/// Upper bound on the channel pool size.
pub const MAX_CHANNELS: usize = 256;

/// Settings passed to [`AudioManager::configure`](crate::manager::AudioManager::configure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Size of the channel pool.
    pub num_channels: usize,
    /// Ask the device for backend-specific effects.
    pub extended_features: bool,
    /// Distance attenuation model.
    pub distance_model: DistanceModel,
    /// Directories searched when loading sound files.
    pub search_paths: Vec<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            num_channels: DEFAULT_CHANNELS,
            extended_features: false,
            distance_model: DistanceModel::default(),
            search_paths: Vec::new(),
        }
    }
}

impl AudioConfig {
    /// Set the channel pool size.
    #[must_use]
    pub const fn with_channels(mut self, count: usize) -> Self {
        self.num_channels = count;
        self
    }

    /// Request extended device features.
    #[must_use]
    pub const fn with_extended_features(mut self, enabled: bool) -> Self {
        self.extended_features = enabled;
        self
    }

    /// Set the distance attenuation model.
    #[must_use]
    pub const fn with_distance_model(mut self, model: DistanceModel) -> Self {
        self.distance_model = model;
        self
    }

    /// Append a directory to the sound search path.
    #[must_use]
    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Clamp values to sensible ranges.
    pub fn validate(&mut self) {
        let clamped = self.num_channels.clamp(1, MAX_CHANNELS);
        if clamped != self.num_channels {
            warn!(
                "num_channels {} out of range, using {}",
                self.num_channels, clamped
            );
            self.num_channels = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = AudioConfig::default()
            .with_channels(4)
            .with_extended_features(true)
            .with_distance_model(DistanceModel::Linear)
            .with_search_path("sounds");

        assert_eq!(config.num_channels, 4);
        assert!(config.extended_features);
        assert_eq!(config.distance_model, DistanceModel::Linear);
        assert_eq!(config.search_paths, vec![PathBuf::from("sounds")]);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = AudioConfig::default().with_channels(0);
        config.validate();
        assert_eq!(config.num_channels, 1);

        let mut config = AudioConfig::default().with_channels(10_000);
        config.validate();
        assert_eq!(config.num_channels, MAX_CHANNELS);
    }

    #[test]
    fn test_partial_json() {
        let config: AudioConfig =
            serde_json::from_str(r#"{"num_channels": 8, "distance_model": "inverse_clamped"}"#)
                .expect("parse");
        assert_eq!(config.num_channels, 8);
        assert_eq!(config.distance_model, DistanceModel::InverseClamped);
        assert!(!config.extended_features);
    }
}
