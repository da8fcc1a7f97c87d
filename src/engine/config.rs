// Scene configuration: every tunable of the scene in one serde struct.
//
// All sections default field by field, so a JSON file only needs the values
// it changes:
//
//   { "surface": { "resolution": 96 }, "progress": { "smoothing": 0.2 } }

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::camera::CameraParams;
use super::error::ConfigError;
use super::particles::FlowParams;
use super::progress::ProgressParams;
use super::rig::RigParams;
use super::surface::SurfaceParams;

/// Seed of the clot erosion pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClotParams {
    pub noise_seed: f32,
}

impl Default for ClotParams {
    fn default() -> Self {
        Self { noise_seed: 7.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub surface:  SurfaceParams,
    pub rig:      RigParams,
    pub clot:     ClotParams,
    pub flow:     FlowParams,
    pub camera:   CameraParams,
    pub progress: ProgressParams,
}

impl SceneConfig {
    /// Read and parse a JSON config.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load from JSON file or return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => {
                log::info!("Loaded scene config from {:?}", path.as_ref());
                config
            }
            Err(ConfigError::Io { .. }) => {
                log::info!("Scene config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to parse scene config: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config: SceneConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SceneConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: SceneConfig =
            serde_json::from_str(r#"{ "surface": { "resolution": 96 }, "progress": { "smoothing": 0.2 } }"#).unwrap();
        assert_eq!(config.surface.resolution, 96);
        assert_eq!(config.surface.isolation, SurfaceParams::default().isolation);
        assert_eq!(config.progress.smoothing, 0.2);
        assert_eq!(config.rig, RigParams::default());
    }

    #[test]
    fn json_round_trip_preserves_everything() {
        let mut config = SceneConfig::default();
        config.flow.budget = 120;
        config.camera.fov_degrees = 42.0;
        let back: SceneConfig = serde_json::from_str(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = SceneConfig::load_or_default("definitely/not/here.json");
        assert_eq!(config, SceneConfig::default());
        assert!(matches!(SceneConfig::load("definitely/not/here.json"), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let path = std::env::temp_dir().join("vascular_journey_bad_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(SceneConfig::load(&path), Err(ConfigError::Json(_))));
        assert_eq!(SceneConfig::load_or_default(&path), SceneConfig::default());
        let _ = std::fs::remove_file(&path);
    }
}
