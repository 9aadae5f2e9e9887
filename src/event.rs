//! Event model
//!
//! Classified key events produced by the capture loop and consumed exactly
//! once by the dispatcher, plus modifier tracking shared between the two
//! threads.

use evdev::Key;
use std::time::Instant;

/// Event classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Data key went down
    Press,
    /// Data key came up
    Release,
    /// Timer-driven repeat while a data key is held
    Repeat,
    /// A modifier key changed physical state
    ModifierChanged,
    /// Physical event to mirror verbatim to the OS
    RawKey,
}

/// A classified input event
#[derive(Debug, Clone)]
pub struct InputEvent {
    pub kind: EventKind,
    /// Lowercase evdev key name (e.g. "key_a")
    pub key_name: String,
    /// evdev key code
    pub key_code: u16,
    /// Key is down (unused for RawKey, which carries `raw_value`)
    pub active: bool,
    pub timestamp: Instant,
    /// Raw evdev value (1 = down, 0 = up), meaningful for RawKey
    pub raw_value: i32,
}

impl InputEvent {
    pub fn new(kind: EventKind, key_code: u16, active: bool, raw_value: i32) -> Self {
        Self {
            kind,
            key_name: key_name(key_code),
            key_code,
            active,
            timestamp: Instant::now(),
            raw_value,
        }
    }
}

/// Modifier classes tracked independently of layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Shift,
    Ctrl,
    Alt,
    Super,
}

/// Classify a key code as a modifier, if it is one
pub fn modifier_for_code(code: u16) -> Option<Modifier> {
    match Key::new(code) {
        Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => Some(Modifier::Shift),
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => Some(Modifier::Ctrl),
        Key::KEY_LEFTALT | Key::KEY_RIGHTALT => Some(Modifier::Alt),
        Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => Some(Modifier::Super),
        _ => None,
    }
}

/// Latest known physical state of each modifier.
///
/// Written only by the capture thread, snapshotted by the dispatcher (under
/// the surrounding mutex) to decide shortcut bypass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifierState {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub super_: bool,
}

impl ModifierState {
    pub fn set(&mut self, modifier: Modifier, active: bool) {
        match modifier {
            Modifier::Shift => self.shift = active,
            Modifier::Ctrl => self.ctrl = active,
            Modifier::Alt => self.alt = active,
            Modifier::Super => self.super_ = active,
        }
    }

    /// Shortcut bypass: any non-Shift modifier held. Shift alone never
    /// bypasses, it is part of normal typing.
    pub fn bypass_active(&self) -> bool {
        self.ctrl || self.alt || self.super_
    }
}

/// Lowercase name for a key code ("key_a", "key_leftshift").
///
/// Unknown codes fall back to "key_<code>" so they still get a stable,
/// unmappable name.
pub fn key_name(code: u16) -> String {
    let debug = format!("{:?}", Key::new(code));
    if debug.starts_with("KEY_") || debug.starts_with("BTN_") {
        debug.to_ascii_lowercase()
    } else {
        format!("key_{}", code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(Key::KEY_A.code()), "key_a");
        assert_eq!(key_name(Key::KEY_LEFTSHIFT.code()), "key_leftshift");
    }

    #[test]
    fn test_unknown_key_name_is_stable() {
        let name = key_name(0x2fe);
        assert!(name.starts_with("key_"));
    }

    #[test]
    fn test_modifier_classification() {
        assert_eq!(
            modifier_for_code(Key::KEY_RIGHTCTRL.code()),
            Some(Modifier::Ctrl)
        );
        assert_eq!(
            modifier_for_code(Key::KEY_LEFTMETA.code()),
            Some(Modifier::Super)
        );
        assert_eq!(modifier_for_code(Key::KEY_A.code()), None);
    }

    #[test]
    fn test_bypass_ignores_shift() {
        let mut mods = ModifierState::default();
        mods.set(Modifier::Shift, true);
        assert!(!mods.bypass_active());
        mods.set(Modifier::Alt, true);
        assert!(mods.bypass_active());
    }
}
