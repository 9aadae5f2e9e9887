//! Persisted remapper state
//!
//! Tracks the active layout name, the base layer name and the value of
//! every toggle layer. Read once at startup (missing or corrupt files fall
//! back to defaults) and rewritten after every toggle flip.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_LAYOUT: &str = "default";
pub const DEFAULT_LAYER: &str = "base";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    /// Active layout name (resolved to `<config>/layouts/<name>.toml`)
    pub layout: String,
    /// Base layer name used when no hold/toggle/onetime layer is current
    pub layer: String,
    /// Toggle layer name → saved value
    pub toggles: BTreeMap<String, bool>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            layout: DEFAULT_LAYOUT.to_string(),
            layer: DEFAULT_LAYER.to_string(),
            toggles: BTreeMap::new(),
        }
    }
}

impl PersistedState {
    /// Load from `path`, falling back to defaults on any problem
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    warn!("State file corrupted, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                debug!("No state file ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

/// External storage the engine mirrors toggle flips into
pub trait StateStore {
    fn save(&mut self, state: &PersistedState);
}

/// TOML file store at `<config>/state.toml`
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StateStore for FileStateStore {
    fn save(&mut self, state: &PersistedState) {
        let content = match toml::to_string_pretty(state) {
            Ok(c) => c,
            Err(e) => {
                warn!("Failed to serialize state: {}", e);
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, content) {
            warn!("Failed to save state to {}: {}", self.path.display(), e);
        } else {
            debug!(
                "State saved: layout={}, layer={}",
                state.layout, state.layer
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = PersistedState::default();
        assert_eq!(state.layout, "default");
        assert_eq!(state.layer, "base");
        assert!(state.toggles.is_empty());
    }

    #[test]
    fn test_missing_file_falls_back() {
        let state = PersistedState::load(Path::new("/nonexistent/state.toml"));
        assert_eq!(state.layout, "default");
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("keylayer_state_test_{}.toml", std::process::id()));
        std::fs::write(&path, "layout = [not toml").unwrap();
        let state = PersistedState::load(&path);
        assert_eq!(state.layer, "base");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_roundtrip_through_file_store() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("keylayer_state_rt_{}.toml", std::process::id()));
        let mut state = PersistedState::default();
        state.toggles.insert("num".to_string(), true);
        FileStateStore::new(path.clone()).save(&state);
        let loaded = PersistedState::load(&path);
        assert_eq!(loaded.toggles.get("num"), Some(&true));
        let _ = std::fs::remove_file(&path);
    }
}
