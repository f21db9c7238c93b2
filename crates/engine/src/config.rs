use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {field}: {message}")]
    Parse { field: String, message: String },
    #[error("invalid config value at {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldSettings {
    pub segment_size: u32,
    pub subscription_radius: u32,
    pub subscription_radius_z: u32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            segment_size: 32,
            subscription_radius: 1,
            subscription_radius_z: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FootprintSettings {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PerspectiveSettings {
    /// Half-width, in lattice cells, of the window searched for overhead geometry.
    pub overhead_search_radius: u32,
    /// Fractional player z below which the upper layer is ignored.
    pub interpolation_threshold: f32,
    pub view_height_tiles: f32,
    pub entity_list_pool_capacity: usize,
    pub default_player_footprint: FootprintSettings,
    pub item_z_tolerance: f32,
}

impl Default for FootprintSettings {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 2.0,
        }
    }
}

impl Default for PerspectiveSettings {
    fn default() -> Self {
        Self {
            overhead_search_radius: 3,
            interpolation_threshold: 0.01,
            view_height_tiles: 16.0,
            entity_list_pool_capacity: 256,
            default_player_footprint: FootprintSettings::default(),
            item_z_tolerance: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpriteSettings {
    pub tile_size_px: u32,
}

impl Default for SpriteSettings {
    fn default() -> Self {
        Self { tile_size_px: 32 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub world: WorldSettings,
    pub perspective: PerspectiveSettings,
    pub sprites: SpriteSettings,
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let config: EngineConfig = serde_path_to_error::deserialize(&mut deserializer)
            .map_err(|error| {
                let field = error.path().to_string();
                let message = error.into_inner().to_string();
                ConfigError::Parse { field, message }
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads `path` when it exists and falls back to defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world.segment_size == 0 {
            return Err(invalid("world.segment_size", "must be positive"));
        }
        if self.sprites.tile_size_px == 0 {
            return Err(invalid("sprites.tile_size_px", "must be positive"));
        }
        let perspective = &self.perspective;
        if !(0.0..1.0).contains(&perspective.interpolation_threshold) {
            return Err(invalid(
                "perspective.interpolation_threshold",
                format!("expected [0, 1), got {}", perspective.interpolation_threshold),
            ));
        }
        if !positive_finite(perspective.view_height_tiles) {
            return Err(invalid(
                "perspective.view_height_tiles",
                format!(
                    "expected positive finite number, got {}",
                    perspective.view_height_tiles
                ),
            ));
        }
        let footprint = perspective.default_player_footprint;
        if !positive_finite(footprint.width) || !positive_finite(footprint.height) {
            return Err(invalid(
                "perspective.default_player_footprint",
                format!(
                    "expected positive finite size, got {}x{}",
                    footprint.width, footprint.height
                ),
            ));
        }
        if !perspective.item_z_tolerance.is_finite() || perspective.item_z_tolerance < 0.0 {
            return Err(invalid(
                "perspective.item_z_tolerance",
                format!(
                    "expected non-negative number, got {}",
                    perspective.item_z_tolerance
                ),
            ));
        }
        Ok(())
    }
}

fn positive_finite(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let config = EngineConfig::from_json_str("{}").expect("config");
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.perspective.overhead_search_radius, 3);
        assert!((config.perspective.interpolation_threshold - 0.01).abs() < 1e-6);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = r#"{"world":{"segment_size":16},"sprites":{"tile_size_px":24}}"#;
        let config = EngineConfig::from_json_str(raw).expect("config");
        assert_eq!(config.world.segment_size, 16);
        assert_eq!(config.world.subscription_radius, 1);
        assert_eq!(config.sprites.tile_size_px, 24);
    }

    #[test]
    fn parse_error_names_field_path() {
        let err = EngineConfig::from_json_str(r#"{"perspective":{"overhead_search_radius":"far"}}"#)
            .expect_err("should fail");
        match err {
            ConfigError::Parse { field, .. } => {
                assert_eq!(field, "perspective.overhead_search_radius")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(EngineConfig::from_json_str(r#"{"world":{"segment_sz":16}}"#).is_err());
    }

    #[test]
    fn validation_rejects_zero_segment_size() {
        let err = EngineConfig::from_json_str(r#"{"world":{"segment_size":0}}"#)
            .expect_err("should fail");
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "world.segment_size",
                ..
            }
        ));
    }

    #[test]
    fn validation_rejects_degenerate_footprint() {
        let mut config = EngineConfig::default();
        config.perspective.default_player_footprint.height = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_or_default_reads_file_when_present() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("engine.json");
        assert_eq!(
            EngineConfig::load_or_default(&path).expect("defaults"),
            EngineConfig::default()
        );

        std::fs::write(&path, r#"{"perspective":{"view_height_tiles":8.0}}"#).expect("write");
        let config = EngineConfig::load_or_default(&path).expect("config");
        assert!((config.perspective.view_height_tiles - 8.0).abs() < 1e-6);
    }
}
