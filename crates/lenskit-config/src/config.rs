//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use lenskit_render::{AnamorphicParams, RadialWarpParams, TargetFormat};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Intermediate target settings.
    pub render: RenderConfig,
    /// Anamorphic streak parameters.
    pub anamorphic: AnamorphicParams,
    /// Radial warp and ghosts parameters.
    pub radial_warp: RadialWarpParams,
    /// Headless preview run.
    pub preview: PreviewConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Rendering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Texel format of every pyramid target.
    pub target_format: TargetFormat,
}

/// Settings for the headless preview run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    /// Camera width in pixels.
    pub width: u32,
    /// Camera height in pixels.
    pub height: u32,
    /// Frames to render.
    pub frames: u32,
    /// Number of cameras rendered each frame.
    pub cameras: u32,
    /// Treat cameras as interactive (enables fade feedback).
    pub interactive: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            frames: 3,
            cameras: 1,
            interactive: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for lenskit, e.g. `~/.config/lenskit` on Linux.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lenskit")
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    ///
    /// Effect parameters are clamped to their ranges on load.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = Self::read(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let new_config = Self::read(&config_dir.join(CONFIG_FILE))?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Clamp every effect parameter to its range.
    pub fn clamp_effects(&mut self) {
        self.anamorphic = self.anamorphic.clamped();
        self.radial_warp = self.radial_warp.clamped();
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.clamp_effects();
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("target_format: Compact"));
        assert!(ron_str.contains("downsample_factor: 2.0"));
        assert!(ron_str.contains("width: 1280"));
        assert!(!ron_str.contains("spectral_lut"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.anamorphic.direction = 45.0;
        config.radial_warp.levels = 3;
        config.render.target_format = TargetFormat::HighPrecision;
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let ron_str = "(anamorphic: (intensity: 0.4), preview: ())";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.anamorphic.intensity, 0.4);
        assert_eq!(config.anamorphic.threshold, 1.0);
        assert_eq!(config.radial_warp, RadialWarpParams::default());
        assert_eq!(config.preview, PreviewConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let ron_str = "(future_setting: true)";
        let result: Result<Config, _> = ron::from_str(ron_str);
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.anamorphic.intensity = 0.7;
        config.anamorphic.tint = [1.0, 0.8, 0.6, 1.0];
        config.radial_warp.intensity = 0.3;
        config.preview.cameras = 2;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_out_of_range_values_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "(anamorphic: (fade: 0.9, direction: 400.0), radial_warp: (levels: 12))",
        )
        .unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config.anamorphic.fade, 0.3);
        assert_eq!(config.anamorphic.direction, 180.0);
        assert_eq!(config.radial_warp.levels, 4);
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.anamorphic.direction = 90.0;
        modified.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert_eq!(result.unwrap().anamorphic.direction, 90.0);
    }

    #[test]
    fn test_reload_no_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let result = config.reload(dir.path()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();
        let err = Config::load_or_create(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        let config_path = dir.path().join(CONFIG_FILE);
        assert_eq!(err.path(), Some(config_path.as_path()));
        assert!(err.to_string().contains(&config_path.display().to_string()));
    }

    #[test]
    fn test_reload_of_missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::default().reload(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_nan_values_clamped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "(anamorphic: (direction: NaN), radial_warp: (downsample_factor: NaN))",
        )
        .unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config.anamorphic.direction, 0.0);
        assert_eq!(config.radial_warp.downsample_factor, 1.0);
        assert_eq!(config.reload(dir.path()).unwrap(), None);
    }

    #[test]
    fn test_ron_comments_preserved() {
        let ron_str = "// streaks off by default\n(\n  // no overrides\n)";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_default_config_dir_is_named() {
        assert!(default_config_dir().ends_with("lenskit"));
    }
}
