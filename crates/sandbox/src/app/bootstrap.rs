use std::path::{Path, PathBuf};

use engine::{resolve_app_paths, ConfigError, EngineConfig, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::house_scene::HouseScene;

const CONFIG_ENV_VAR: &str = "TILEGE_CONFIG";
const FRAME_LIMIT_ENV_VAR: &str = "TILEGE_FRAME_LIMIT";

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub(crate) struct AppWiring {
    pub(crate) engine_config: EngineConfig,
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Tile GE Sandbox Startup ===");

    let paths = resolve_app_paths()?;
    let config_path = std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.default_config_path.clone());
    let engine_config = load_engine_config(&config_path)?;
    let frame_limit = parse_frame_limit(std::env::var(FRAME_LIMIT_ENV_VAR).ok().as_deref());
    info!(
        root = %paths.root.display(),
        config = %config_path.display(),
        segment_size = engine_config.world.segment_size,
        "sandbox_paths"
    );

    let config = LoopConfig {
        frame_limit,
        asset_root: Some(paths.assets_dir),
        ..LoopConfig::default()
    };

    Ok(AppWiring {
        engine_config,
        config,
        scene: Box::new(HouseScene::new()),
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.is_file() {
        info!(path = %path.display(), "engine_config_defaulted");
    }
    EngineConfig::load_or_default(path)
}

fn parse_frame_limit(raw: Option<&str>) -> Option<u64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!(value = raw, var = FRAME_LIMIT_ENV_VAR, "frame_limit_ignored");
            None
        }
        Ok(limit) => Some(limit),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn frame_limit_accepts_positive_integers_only() {
        assert_eq!(parse_frame_limit(None), None);
        assert_eq!(parse_frame_limit(Some(" 120 ")), Some(120));
        assert_eq!(parse_frame_limit(Some("")), None);
        assert_eq!(parse_frame_limit(Some("0")), None);
        assert_eq!(parse_frame_limit(Some("ten")), None);
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_engine_config(&dir.path().join("engine.json")).expect("config");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn config_file_overrides_selected_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "world": { "segment_size": 16 } }"#).expect("write config");

        let config = load_engine_config(&path).expect("config");
        assert_eq!(config.world.segment_size, 16);
        assert_eq!(config.perspective, EngineConfig::default().perspective);
    }

    #[test]
    fn bad_config_file_reports_field_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{ "perspective": { "view_height_tiles": "tall" } }"#)
            .expect("write config");

        let err = load_engine_config(&path).expect_err("bad config");
        assert!(err.to_string().contains("perspective.view_height_tiles"));
    }
}
