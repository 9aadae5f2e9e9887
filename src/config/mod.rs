//! Configuration file management
//!
//! Loads TOML configuration files and provides application settings.
//! Default config path: ~/.config/keylayer/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Key repeat settings
    pub repeat: RepeatConfig,
    /// Path settings
    pub paths: PathConfig,
}

/// Key repeat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepeatConfig {
    /// Delay before the first repeat (milliseconds)
    pub initial_delay_ms: u64,
    /// Interval between repeats (milliseconds)
    pub interval_ms: u64,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            interval_ms: 50,
        }
    }
}

impl RepeatConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Path settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PathConfig {
    /// Layout directory (empty: <config>/layouts)
    pub layout_dir: String,
    /// State file (empty: <config>/state.toml)
    pub state_file: String,
}

/// Commented template written by --init-config
const CONFIG_TEMPLATE: &str = r#"# keylayer configuration

[repeat]
# Delay before a held key starts repeating (milliseconds)
initial_delay_ms = 500
# Interval between repeats (milliseconds); backspace and delete
# accelerate from here down to a 10ms floor
interval_ms = 50

[paths]
# Layout directory; empty means <config>/layouts
layout_dir = ""
# State file; empty means <config>/state.toml
state_file = ""
"#;

/// Starter layout written alongside the config template
const LAYOUT_TEMPLATE: &str = r##"# keylayer layout "default"
#
# "source" lists physical keys in order; each layer lists the symbol
# produced at the matching position. Empty symbols produce nothing.

source = ["key_q", "key_w", "key_e", "key_r", "key_t"]

[layers]
base = ["q", "w", "e", "r", "ly1"]
sym = ["@", "#", "€", "&", ""]

# Pressing the key whose base symbol is "ly1" holds the sym layer
[layer_keys.sym]
key = "ly1"
type = "hold"
"##;

impl Config {
    /// Config directory: ~/.config/keylayer
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("keylayer"))
    }

    /// Resolve the config file path:
    /// 1. KEYLAYER_CONFIG environment variable
    /// 2. ~/.config/keylayer/config.toml
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("KEYLAYER_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            warn!("KEYLAYER_CONFIG points at missing file: {}", path.display());
        }
        let path = Self::config_dir()?.join("config.toml");
        path.exists().then_some(path)
    }

    /// Load settings, falling back to built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Write the commented config template and a starter layout. Existing
    /// files are left untouched.
    pub fn write_template() -> Result<PathBuf> {
        let dir = Self::config_dir().context("Config directory not found")?;
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let config_path = dir.join("config.toml");
        if config_path.exists() {
            info!("Config already exists: {}", config_path.display());
        } else {
            std::fs::write(&config_path, CONFIG_TEMPLATE)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            info!("Wrote config template: {}", config_path.display());
        }

        let layout_dir = dir.join("layouts");
        std::fs::create_dir_all(&layout_dir)
            .with_context(|| format!("Failed to create {}", layout_dir.display()))?;
        let layout_path = layout_dir.join("default.toml");
        if layout_path.exists() {
            info!("Layout already exists: {}", layout_path.display());
        } else {
            std::fs::write(&layout_path, LAYOUT_TEMPLATE)
                .with_context(|| format!("Failed to write {}", layout_path.display()))?;
            info!("Wrote starter layout: {}", layout_path.display());
        }

        Ok(config_path)
    }

    /// Directory holding layout documents
    pub fn layout_dir(&self) -> Option<PathBuf> {
        if !self.paths.layout_dir.is_empty() {
            return Some(PathBuf::from(&self.paths.layout_dir));
        }
        Self::config_dir().map(|d| d.join("layouts"))
    }

    /// Path of the named layout document
    pub fn layout_path(&self, name: &str) -> Option<PathBuf> {
        self.layout_dir().map(|d| d.join(format!("{}.toml", name)))
    }

    /// Path of the persisted state file
    pub fn state_path(&self) -> Option<PathBuf> {
        if !self.paths.state_file.is_empty() {
            return Some(PathBuf::from(&self.paths.state_file));
        }
        Self::config_dir().map(|d| d.join("state.toml"))
    }
}
