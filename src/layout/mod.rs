//! Layout documents
//!
//! A layout file defines the physical key order ("source"), per-layer
//! symbol tables and the layer-activation keys. Loading is a one-time
//! parse-and-normalize pass: every layer is padded or truncated to the
//! source length up front, producing immutable fixed-shape tables before
//! any event processing begins.
//!
//! Layout files live at `<config>/layouts/<name>.toml`:
//!
//! ```toml
//! source = ["key_a", "key_s", "key_d"]
//!
//! [layers]
//! base = ["a", "s", "ly1"]
//! sym  = ["@", "$", ""]
//!
//! [layer_keys.sym]
//! key = "ly1"
//! type = "hold"
//! ```

pub mod engine;
pub mod state;
pub mod symbol;

pub use engine::LayerEngine;
pub use state::{FileStateStore, PersistedState};

use log::warn;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("layout file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read layout file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse layout file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Layer activation behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationType {
    /// Active while the activating key is physically held
    Hold,
    /// Active until toggled off again; persists across restarts
    Toggle,
    /// Active for exactly one character resolution
    Onetime,
}

impl ActivationType {
    /// Unknown strings fall back to hold
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "toggle" => Self::Toggle,
            "onetime" => Self::Onetime,
            _ => Self::Hold,
        }
    }
}

/// What a layer-activation key does when pressed
#[derive(Debug, Clone)]
pub struct LayerKeyConfig {
    pub target_layer: String,
    pub activation: ActivationType,
}

/// On-disk document shape
#[derive(Debug, Deserialize)]
struct LayoutDocument {
    source: Vec<String>,
    layers: HashMap<String, Vec<String>>,
    #[serde(default)]
    layer_keys: HashMap<String, LayerKeyEntry>,
}

#[derive(Debug, Deserialize)]
struct LayerKeyEntry {
    #[serde(default, deserialize_with = "deserialize_key_list")]
    key: Vec<String>,
    #[serde(default, rename = "type")]
    activation: String,
}

/// Key field deserializer: accepts a string or an array of strings
fn deserialize_key_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct KeyListVisitor;

    impl<'de> Visitor<'de> for KeyListVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or array of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut keys = Vec::new();
            while let Some(key) = seq.next_element::<String>()? {
                keys.push(key);
            }
            Ok(keys)
        }
    }

    deserializer.deserialize_any(KeyListVisitor)
}

/// Layer-key wiring report produced by [`Layout::verify_layer_keys`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LayerKeyReport {
    /// Base positions whose "ly*" symbol has no layer_keys entry
    pub unconfigured: Vec<(usize, String)>,
    /// Configured key symbols appearing nowhere in the base layer
    pub missing_from_layout: Vec<String>,
}

/// Normalized, immutable layout tables
#[derive(Debug)]
pub struct Layout {
    /// Physical key name → position index (from the ordered source list)
    key_positions: HashMap<String, usize>,
    /// Layer name → symbols, every row exactly source length
    layers: HashMap<String, Vec<String>>,
    /// Cleaned key symbol → activation config
    layer_keys: HashMap<String, LayerKeyConfig>,
}

impl Layout {
    /// Load and normalize a layout file
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        if !path.exists() {
            return Err(LayoutError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| LayoutError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LayoutError> {
        let doc: LayoutDocument = toml::from_str(content)?;

        let mut key_positions = HashMap::new();
        for (i, key) in doc.source.iter().enumerate() {
            key_positions.insert(key.clone(), i);
        }
        let source_len = doc.source.len();

        // Pad short layers with empty symbols, truncate long ones
        let mut layers = doc.layers;
        for (name, row) in layers.iter_mut() {
            if row.len() != source_len {
                warn!(
                    "Layer '{}' has {} symbols, normalizing to {}",
                    name,
                    row.len(),
                    source_len
                );
                row.resize(source_len, String::new());
            }
        }

        // The base layer never activates itself; skip it if present
        let mut layer_keys = HashMap::new();
        for (layer_name, entry) in &doc.layer_keys {
            if layer_name == "base" {
                continue;
            }
            let activation = ActivationType::parse(&entry.activation);
            for key in &entry.key {
                layer_keys.insert(
                    key.clone(),
                    LayerKeyConfig {
                        target_layer: layer_name.clone(),
                        activation,
                    },
                );
            }
        }

        Ok(Self {
            key_positions,
            layers,
            layer_keys,
        })
    }

    pub fn position(&self, key_name: &str) -> Option<usize> {
        self.key_positions.get(key_name).copied()
    }

    pub fn layer(&self, name: &str) -> Option<&[String]> {
        self.layers.get(name).map(|v| v.as_slice())
    }

    pub fn layer_key(&self, cleaned_symbol: &str) -> Option<&LayerKeyConfig> {
        self.layer_keys.get(cleaned_symbol)
    }

    /// Names of all layers activated by a toggle key
    pub fn toggle_layers(&self) -> impl Iterator<Item = &str> {
        self.layer_keys
            .values()
            .filter(|c| c.activation == ActivationType::Toggle)
            .map(|c| c.target_layer.as_str())
    }

    /// Cross-check the base layer against the layer-key table: an "ly*"
    /// symbol without a layer_keys entry would type nothing and activate
    /// nothing, and a configured key absent from the base layer can never
    /// fire. Both are legal but almost certainly layout mistakes.
    pub fn verify_layer_keys(&self) -> LayerKeyReport {
        let mut report = LayerKeyReport::default();
        let Some(base) = self.layer(state::DEFAULT_LAYER) else {
            return report;
        };

        for (pos, raw) in base.iter().enumerate() {
            let cleaned = symbol::clean_symbol(raw);
            if cleaned.starts_with("ly") && !self.layer_keys.contains_key(&cleaned) {
                report.unconfigured.push((pos, cleaned));
            }
        }

        let mut keys: Vec<&String> = self.layer_keys.keys().collect();
        keys.sort();
        for key in keys {
            if !base.iter().any(|raw| symbol::clean_symbol(raw) == **key) {
                report.missing_from_layout.push(key.clone());
            }
        }
        report
    }

    pub fn key_count(&self) -> usize {
        self.key_positions.len()
    }

    pub fn layer_key_count(&self) -> usize {
        self.layer_keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        source = ["key_a", "key_s", "key_d"]

        [layers]
        base = ["a", "s", "ly1"]
        sym = ["@", "$"]
        long = ["1", "2", "3", "4"]

        [layer_keys.sym]
        key = "ly1"
        type = "hold"
    "#;

    #[test]
    fn test_positions_follow_source_order() {
        let layout = Layout::from_toml_str(SAMPLE).unwrap();
        assert_eq!(layout.position("key_a"), Some(0));
        assert_eq!(layout.position("key_d"), Some(2));
        assert_eq!(layout.position("key_q"), None);
        assert_eq!(layout.key_count(), 3);
    }

    #[test]
    fn test_short_layer_padded() {
        let layout = Layout::from_toml_str(SAMPLE).unwrap();
        let sym = layout.layer("sym").unwrap();
        assert_eq!(sym.len(), 3);
        assert_eq!(sym[2], "");
    }

    #[test]
    fn test_long_layer_truncated() {
        let layout = Layout::from_toml_str(SAMPLE).unwrap();
        assert_eq!(layout.layer("long").unwrap(), &["1", "2", "3"]);
    }

    #[test]
    fn test_layer_key_lookup() {
        let layout = Layout::from_toml_str(SAMPLE).unwrap();
        let config = layout.layer_key("ly1").unwrap();
        assert_eq!(config.target_layer, "sym");
        assert_eq!(config.activation, ActivationType::Hold);
        assert!(layout.layer_key("a").is_none());
    }

    #[test]
    fn test_key_accepts_list() {
        let layout = Layout::from_toml_str(
            r#"
            source = ["key_a"]
            [layers]
            base = ["x"]
            [layer_keys.num]
            key = ["ly2", "ly2b"]
            type = "toggle"
            "#,
        )
        .unwrap();
        assert_eq!(layout.layer_key("ly2").unwrap().target_layer, "num");
        assert_eq!(layout.layer_key("ly2b").unwrap().target_layer, "num");
        assert_eq!(layout.layer_key_count(), 2);
    }

    #[test]
    fn test_base_layer_keys_skipped() {
        let layout = Layout::from_toml_str(
            r#"
            source = ["key_a"]
            [layers]
            base = ["x"]
            [layer_keys.base]
            key = "x"
            "#,
        )
        .unwrap();
        assert!(layout.layer_key("x").is_none());
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let result = Layout::from_toml_str("[layers]\nbase = []");
        assert!(matches!(result, Err(LayoutError::Parse(_))));
    }

    #[test]
    fn test_layer_not_a_sequence_is_fatal() {
        let result = Layout::from_toml_str(
            r#"
            source = ["key_a"]
            [layers]
            base = "oops"
            "#,
        );
        assert!(matches!(result, Err(LayoutError::Parse(_))));
    }

    #[test]
    fn test_verify_clean_layout_reports_nothing() {
        let layout = Layout::from_toml_str(SAMPLE).unwrap();
        assert_eq!(layout.verify_layer_keys(), LayerKeyReport::default());
    }

    #[test]
    fn test_verify_flags_unconfigured_ly_symbol() {
        let layout = Layout::from_toml_str(
            r#"
            source = ["key_a", "key_s", "key_d"]
            [layers]
            base = ["a", "ly1", "ly2"]
            sym = ["@", "", ""]
            [layer_keys.sym]
            key = "ly1"
            type = "hold"
            "#,
        )
        .unwrap();
        let report = layout.verify_layer_keys();
        assert_eq!(report.unconfigured, vec![(2, "ly2".to_string())]);
        assert!(report.missing_from_layout.is_empty());
    }

    #[test]
    fn test_verify_flags_key_absent_from_base() {
        let layout = Layout::from_toml_str(
            r#"
            source = ["key_a"]
            [layers]
            base = ["a"]
            num = ["7"]
            [layer_keys.num]
            key = "ly9"
            type = "toggle"
            "#,
        )
        .unwrap();
        let report = layout.verify_layer_keys();
        assert!(report.unconfigured.is_empty());
        assert_eq!(report.missing_from_layout, vec!["ly9".to_string()]);
    }

    #[test]
    fn test_unknown_activation_defaults_to_hold() {
        assert_eq!(ActivationType::parse("sticky"), ActivationType::Hold);
        assert_eq!(ActivationType::parse("TOGGLE"), ActivationType::Toggle);
        assert_eq!(ActivationType::parse("onetime"), ActivationType::Onetime);
    }
}
