//! Configuration file management for backsense.
//!
//! Reads/writes `~/.backsense/config.yaml` with the identifier layout of the
//! bus: base identifier, per-sensor stride, and how many sensors and objects
//! are wired up.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::frame::IdLayout;
use crate::types::{
    BacksenseError, Result, BASE_ID, ID_STRIDE, MAX_OBJECTS_PER_SENSOR, MAX_SENSORS,
};

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bus: BusConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub base_id: u32,
    pub id_stride: u32,
    pub sensors: usize,
    pub objects_per_sensor: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig {
            base_id: BASE_ID,
            id_stride: ID_STRIDE,
            sensors: MAX_SENSORS,
            objects_per_sensor: MAX_OBJECTS_PER_SENSOR,
        }
    }
}

impl Config {
    /// Validated identifier layout.
    pub fn layout(&self) -> Result<IdLayout> {
        IdLayout::new(
            self.bus.base_id,
            self.bus.id_stride,
            self.bus.sensors,
            self.bus.objects_per_sensor,
        )
    }
}

/// Get the config directory path (`~/.backsense/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".backsense")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.backsense/config.yaml`.
///
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("ignoring {}: {e}", path.display());
            Config::default()
        }
    }
}

/// Load config from an explicit path. Missing keys take their defaults.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Save config to `~/.backsense/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

/// Save config to an explicit path, creating parent directories.
pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| BacksenseError::Config(e.to_string()))?;
    }
    let text = render_config(config)?;
    std::fs::write(path, text).map_err(|e| BacksenseError::Config(e.to_string()))
}

fn parse_config(text: &str) -> Result<Config> {
    let has_content = text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('#')
    });
    if !has_content {
        return Ok(Config::default());
    }
    serde_yaml::from_str(text).map_err(|e| BacksenseError::Config(e.to_string()))
}

/// Render config as the YAML text written by `save_config`.
pub fn render_config(config: &Config) -> Result<String> {
    let body = serde_yaml::to_string(config).map_err(|e| BacksenseError::Config(e.to_string()))?;
    Ok(format!("# backsense configuration\n\n{body}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
