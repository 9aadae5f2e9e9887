//! Event delivery back to the OS
//!
//! The dispatch loop talks to an [`OutputSink`]; the production sink is a
//! uinput virtual keyboard. Raw events are mirrored verbatim, a handful of
//! control characters become key taps on the virtual device, and everything
//! else is typed through `wtype` so the active application receives proper
//! unicode text.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key};
use log::{debug, info, warn};
use std::process::Command;
use thiserror::Error;

const VIRTUAL_DEVICE_NAME: &str = "keylayer virtual keyboard";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create uinput virtual keyboard: {0}")]
    UinputUnavailable(#[from] std::io::Error),
}

/// Where resolved output goes. Mocked in dispatch tests.
pub trait OutputSink {
    /// Mirror a raw key event (code and value) unchanged
    fn forward_raw(&mut self, key_code: u16, value: i32);

    /// Deliver one character to the focused application. False means the
    /// character was lost; the caller logs and moves on.
    fn send_character(&mut self, ch: char) -> bool;

    /// Release every modifier on the virtual device, for shutdown
    fn release_all_modifiers(&mut self);
}

/// Uinput-backed keyboard advertising the whole keyboard key range
pub struct VirtualKeyboard {
    device: VirtualDevice,
}

const MODIFIER_KEYS: [Key; 8] = [
    Key::KEY_LEFTSHIFT,
    Key::KEY_RIGHTSHIFT,
    Key::KEY_LEFTCTRL,
    Key::KEY_RIGHTCTRL,
    Key::KEY_LEFTALT,
    Key::KEY_RIGHTALT,
    Key::KEY_LEFTMETA,
    Key::KEY_RIGHTMETA,
];

/// Key tap for a control character, where one exists
fn control_key_for(ch: char) -> Option<Key> {
    match ch {
        '\n' => Some(Key::KEY_ENTER),
        '\t' => Some(Key::KEY_TAB),
        '\u{8}' => Some(Key::KEY_BACKSPACE),
        '\u{1b}' => Some(Key::KEY_ESC),
        ' ' => Some(Key::KEY_SPACE),
        _ => None,
    }
}

impl VirtualKeyboard {
    pub fn new() -> Result<Self, OutputError> {
        // Advertise the standard keyboard code range so any forwarded raw
        // event is accepted.
        let mut keys = AttributeSet::<Key>::new();
        for code in 1..=248u16 {
            keys.insert(Key::new(code));
        }

        let device = VirtualDeviceBuilder::new()?
            .name(VIRTUAL_DEVICE_NAME)
            .with_keys(&keys)?
            .build()?;

        info!("Virtual keyboard created: {}", VIRTUAL_DEVICE_NAME);
        Ok(Self { device })
    }

    fn emit(&mut self, events: &[InputEvent]) -> bool {
        if let Err(e) = self.device.emit(events) {
            warn!("uinput emit failed: {}", e);
            return false;
        }
        true
    }

    fn tap(&mut self, key: Key) -> bool {
        let press = InputEvent::new(EventType::KEY, key.code(), 1);
        let release = InputEvent::new(EventType::KEY, key.code(), 0);
        self.emit(&[press, release])
    }

    /// Type a character through wtype, which handles keymap lookup and
    /// unicode composition on the compositor side.
    fn type_via_wtype(&mut self, ch: char) -> bool {
        let text = ch.to_string();
        match Command::new("wtype").arg("--").arg(&text).status() {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!("wtype exited with {} for {:?}", status, ch);
                false
            }
            Err(e) => {
                warn!("Failed to run wtype: {}", e);
                false
            }
        }
    }
}

impl OutputSink for VirtualKeyboard {
    fn forward_raw(&mut self, key_code: u16, value: i32) {
        let event = InputEvent::new(EventType::KEY, key_code, value);
        self.emit(&[event]);
    }

    fn send_character(&mut self, ch: char) -> bool {
        if let Some(key) = control_key_for(ch) {
            debug!("Sending control character {:?} as key tap", ch);
            return self.tap(key);
        }
        self.type_via_wtype(ch)
    }

    fn release_all_modifiers(&mut self) {
        let events: Vec<InputEvent> = MODIFIER_KEYS
            .iter()
            .map(|k| InputEvent::new(EventType::KEY, k.code(), 0))
            .collect();
        self.emit(&events);
        debug!("All virtual modifiers released");
    }
}
