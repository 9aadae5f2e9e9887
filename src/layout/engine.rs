//! Layer resolution engine
//!
//! Holds the immutable layout tables and the mutable layer state, and turns
//! a physical key press into either a character, a layer transition or no
//! output. Touched exclusively by the dispatch thread.
//!
//! Layer priority: armed onetime layer, then active hold layer, then the
//! most recently activated toggle layer, then the base layer.

use super::state::{PersistedState, StateStore};
use super::symbol::{clean_symbol, decode_symbol};
use super::{ActivationType, Layout};
use log::{debug, warn};

/// Mutable layer activation state
#[derive(Debug, Default)]
struct LayerState {
    /// Active hold layer and the key code that activated it
    hold: Option<(String, u16)>,
    /// Armed onetime layer, consumed by the next character resolution
    onetime: Option<String>,
    /// Active toggle layers, most recently activated first
    active_toggles: Vec<String>,
}

pub struct LayerEngine {
    layout: Layout,
    state: LayerState,
    persisted: PersistedState,
    store: Box<dyn StateStore>,
}

impl LayerEngine {
    pub fn new(layout: Layout, persisted: PersistedState, store: Box<dyn StateStore>) -> Self {
        // Seed toggle values for every toggle layer the layout declares,
        // restoring saved flips. Sorted order keeps startup deterministic.
        let mut persisted = persisted;
        let mut active = Vec::new();
        let mut names: Vec<String> = layout.toggle_layers().map(str::to_string).collect();
        names.sort();
        names.dedup();
        for name in names {
            let saved = persisted.toggles.get(&name).copied().unwrap_or(false);
            persisted.toggles.insert(name.clone(), saved);
            if saved {
                active.push(name);
            }
        }

        Self {
            layout,
            state: LayerState {
                active_toggles: active,
                ..LayerState::default()
            },
            persisted,
            store,
        }
    }

    fn base_layer(&self) -> &str {
        &self.persisted.layer
    }

    /// The single layer character resolution uses right now
    pub fn resolve_current_layer(&self) -> &str {
        if let Some(layer) = &self.state.onetime {
            return layer;
        }
        if let Some((layer, _)) = &self.state.hold {
            return layer;
        }
        if let Some(layer) = self.state.active_toggles.first() {
            return layer;
        }
        self.base_layer()
    }

    /// Process a press or repeat of a physical key.
    ///
    /// Returns the character to deliver, or None when the key is unmapped,
    /// was consumed as a layer-activation key, or resolves to no output.
    pub fn process_key_event(&mut self, key_name: &str, key_code: u16) -> Option<char> {
        let pos = self.layout.position(key_name)?;

        // Layer-activation keys are defined positionally against the base
        // layout, so this lookup always uses the base layer no matter which
        // layer is currently active.
        let base = self.base_layer().to_string();
        let Some(base_row) = self.layout.layer(&base) else {
            warn!("Base layer '{}' not found in layout", base);
            return None;
        };
        let Some(base_symbol) = base_row.get(pos) else {
            warn!("Position {} out of bounds for base layer", pos);
            return None;
        };

        let cleaned = clean_symbol(base_symbol);
        if let Some(config) = self.layout.layer_key(&cleaned).cloned() {
            self.apply_activation(&config.target_layer, config.activation, key_code);
            return None;
        }

        let current = self.resolve_current_layer().to_string();
        let Some(row) = self.layout.layer(&current) else {
            warn!("Layer not found: {}", current);
            return None;
        };
        let Some(symbol) = row.get(pos) else {
            warn!("Position {} out of bounds for layer '{}'", pos, current);
            return None;
        };
        let symbol = symbol.clone();

        // A onetime layer applies to exactly this resolution
        if let Some(consumed) = self.state.onetime.take() {
            debug!("Onetime layer '{}' consumed", consumed);
        }

        decode_symbol(&symbol)
    }

    /// Clear the hold layer when its originating key is released
    pub fn handle_key_release(&mut self, key_code: u16) {
        if self
            .state
            .hold
            .as_ref()
            .is_some_and(|(_, code)| *code == key_code)
        {
            debug!("Hold layer deactivated");
            self.state.hold = None;
        }
    }

    fn apply_activation(&mut self, target: &str, activation: ActivationType, key_code: u16) {
        match activation {
            ActivationType::Hold => {
                debug!("Hold layer '{}' activated", target);
                self.state.hold = Some((target.to_string(), key_code));
            }
            ActivationType::Toggle => {
                let now_active = !self.persisted.toggles.get(target).copied().unwrap_or(false);
                self.persisted.toggles.insert(target.to_string(), now_active);
                self.state.active_toggles.retain(|l| l != target);
                if now_active {
                    debug!("Toggle layer '{}' activated", target);
                    self.state.active_toggles.insert(0, target.to_string());
                } else {
                    debug!("Toggle layer '{}' deactivated", target);
                }
                self.store.save(&self.persisted);
            }
            ActivationType::Onetime => {
                debug!("Onetime layer '{}' armed", target);
                self.state.onetime = Some(target.to_string());
            }
        }
    }
}
