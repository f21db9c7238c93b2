use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpriteKeyError {
    #[error("sprite key must not be empty")]
    Empty,
    #[error("sprite key must not start with '/'")]
    LeadingSlash,
    #[error("sprite key must not contain '..'")]
    ParentTraversal,
    #[error("sprite key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

/// Asset-relative sprite name such as `characters/player`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpriteKey(String);

impl SpriteKey {
    pub fn parse(raw: &str) -> Result<Self, SpriteKeyError> {
        if raw.is_empty() {
            return Err(SpriteKeyError::Empty);
        }
        if raw.starts_with('/') {
            return Err(SpriteKeyError::LeadingSlash);
        }
        if raw.contains("..") {
            return Err(SpriteKeyError::ParentTraversal);
        }
        if let Some(character) = raw.chars().find(|ch| {
            !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '/' | '-'))
        }) {
            return Err(SpriteKeyError::InvalidCharacter { character });
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpriteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileFootprint {
    pub width: f32,
    pub height: f32,
}

/// Sprite dimension lookup used to size on-screen footprints in tile units.
#[derive(Debug)]
pub struct SpriteCatalog {
    tile_size_px: u32,
    asset_root: Option<PathBuf>,
    dimensions_px: HashMap<String, Option<(u32, u32)>>,
    warned_keys: HashSet<String>,
}

impl SpriteCatalog {
    pub fn new(tile_size_px: u32) -> Self {
        Self {
            tile_size_px: tile_size_px.max(1),
            asset_root: None,
            dimensions_px: HashMap::new(),
            warned_keys: HashSet::new(),
        }
    }

    pub fn with_asset_root(mut self, asset_root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(asset_root.into());
        self
    }

    pub fn tile_size_px(&self) -> u32 {
        self.tile_size_px
    }

    pub fn register(
        &mut self,
        key: &str,
        width_px: u32,
        height_px: u32,
    ) -> Result<(), SpriteKeyError> {
        let key = SpriteKey::parse(key)?;
        self.dimensions_px.insert(key.0, Some((width_px, height_px)));
        Ok(())
    }

    /// Returns the pixel size of `key`, reading `<assets>/sprites/<key>.png` on first use.
    /// Failures are cached and warned about once per key.
    pub fn resolve(&mut self, key: &str) -> Option<(u32, u32)> {
        if let Some(cached) = self.dimensions_px.get(key) {
            return *cached;
        }
        let dimensions = match self.read_dimensions(key) {
            Ok(dimensions) => Some(dimensions),
            Err(reason) => {
                self.warn_once(key, &reason);
                None
            }
        };
        self.dimensions_px.insert(key.to_string(), dimensions);
        dimensions
    }

    /// Cached footprint only; call [`SpriteCatalog::resolve`] beforehand to load from disk.
    pub fn tile_footprint(&self, key: &str) -> Option<TileFootprint> {
        let (width_px, height_px) = (*self.dimensions_px.get(key)?)?;
        let tile = self.tile_size_px as f32;
        Some(TileFootprint {
            width: width_px as f32 / tile,
            height: height_px as f32 / tile,
        })
    }

    fn read_dimensions(&self, key: &str) -> Result<(u32, u32), String> {
        let key = SpriteKey::parse(key).map_err(|error| format!("invalid_key:{error}"))?;
        let Some(asset_root) = self.asset_root.as_deref() else {
            return Err("no_asset_root".to_string());
        };
        let path = sprite_image_path(asset_root, &key);
        image::image_dimensions(&path).map_err(|error| format!("read_failed:{error}"))
    }

    fn warn_once(&mut self, key: &str, reason: &str) {
        if !self.warned_keys.insert(key.to_string()) {
            return;
        }
        warn!(sprite_key = key, reason, "sprite_dimensions_unavailable");
    }
}

fn sprite_image_path(asset_root: &Path, key: &SpriteKey) -> PathBuf {
    asset_root
        .join("sprites")
        .join(format!("{}.png", key.as_str()))
}
