//! Physical keyboard discovery and exclusive acquisition
//!
//! Scans /dev/input for event devices, filters to real keyboards by
//! capability, scores the survivors and grabs the best one exclusively.
//! This is a one-shot startup operation: if nothing qualifies or the grab
//! fails, startup fails, there is no retry.

use evdev::{Device, EventType, Key};
use log::{debug, info, warn};
use std::os::unix::io::AsRawFd;
use thiserror::Error;

/// Reference key set a keyboard is expected to implement (at least
/// [`MIN_REFERENCE_KEYS`] of them): alphanumerics, the paired modifiers and
/// basic editing keys.
const REFERENCE_KEYS: [Key; 45] = [
    Key::KEY_A,
    Key::KEY_B,
    Key::KEY_C,
    Key::KEY_D,
    Key::KEY_E,
    Key::KEY_F,
    Key::KEY_G,
    Key::KEY_H,
    Key::KEY_I,
    Key::KEY_J,
    Key::KEY_K,
    Key::KEY_L,
    Key::KEY_M,
    Key::KEY_N,
    Key::KEY_O,
    Key::KEY_P,
    Key::KEY_Q,
    Key::KEY_R,
    Key::KEY_S,
    Key::KEY_T,
    Key::KEY_U,
    Key::KEY_V,
    Key::KEY_W,
    Key::KEY_X,
    Key::KEY_Y,
    Key::KEY_Z,
    Key::KEY_1,
    Key::KEY_2,
    Key::KEY_3,
    Key::KEY_4,
    Key::KEY_5,
    Key::KEY_6,
    Key::KEY_7,
    Key::KEY_8,
    Key::KEY_9,
    Key::KEY_0,
    Key::KEY_LEFTCTRL,
    Key::KEY_RIGHTCTRL,
    Key::KEY_LEFTSHIFT,
    Key::KEY_RIGHTSHIFT,
    Key::KEY_LEFTALT,
    Key::KEY_RIGHTALT,
    Key::KEY_TAB,
    Key::KEY_ESC,
    Key::KEY_BACKSPACE,
];

const MIN_REFERENCE_KEYS: usize = 30;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no physical keyboard detected among input devices")]
    NoKeyboardFound,
    #[error("failed to grab keyboard '{name}': {source}")]
    GrabFailed {
        name: String,
        source: std::io::Error,
    },
}

/// A qualifying keyboard candidate, kept only until selection
struct Candidate {
    score: i32,
    endpoint: Option<i32>,
    name: String,
    device: Device,
}

/// The grabbed physical keyboard. Sole owner of the device handle; moves
/// into the capture thread for the process lifetime.
pub struct CapturedDevice {
    device: Device,
    name: String,
}

impl CapturedDevice {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }
}

/// Pull the USB endpoint number out of a physical-address string such as
/// "usb-0000:00:14.0-1/input0".
fn parse_endpoint(phys: &str) -> Option<i32> {
    let tail = &phys[phys.rfind("input")? + "input".len()..];
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Priority score: endpoint 0 devices are the primary keyboard interface,
/// lower endpoints beat higher ones, and a name mentioning "keyboard"
/// breaks ties upward.
fn score_candidate(endpoint: Option<i32>, name: &str) -> i32 {
    let mut score = match endpoint {
        Some(0) => 100,
        Some(n) => 50 - n,
        None => 0,
    };
    if name.to_ascii_lowercase().contains("keyboard") {
        score += 10;
    }
    score
}

/// Sort key: score descending, endpoint ascending (no endpoint sorts
/// last), name ascending.
fn sort_key(score: i32, endpoint: Option<i32>, name: &str) -> (i32, i32, String) {
    (-score, endpoint.unwrap_or(i32::MAX), name.to_string())
}

fn qualifies(device: &Device) -> bool {
    let events = device.supported_events();
    // LED support is the heuristic separating keyboards from generic HID
    // key emitters; axes exclude pointing devices.
    if !events.contains(EventType::KEY) || !events.contains(EventType::LED) {
        return false;
    }
    if events.contains(EventType::RELATIVE) || events.contains(EventType::ABSOLUTE) {
        return false;
    }
    let Some(keys) = device.supported_keys() else {
        return false;
    };
    let present = REFERENCE_KEYS.iter().filter(|k| keys.contains(**k)).count();
    present >= MIN_REFERENCE_KEYS
}

fn enumerate_candidates() -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (path, device) in evdev::enumerate() {
        if !qualifies(&device) {
            debug!("Skipping {:?}: not a physical keyboard", path);
            continue;
        }
        let endpoint = device.physical_path().and_then(parse_endpoint);
        let name = device.name().unwrap_or("Unknown").to_string();
        let score = score_candidate(endpoint, &name);
        debug!(
            "Candidate {:?}: score={} endpoint={:?} name='{}'",
            path, score, endpoint, name
        );
        candidates.push(Candidate {
            score,
            endpoint,
            name,
            device,
        });
    }
    candidates.sort_by_key(|c| sort_key(c.score, c.endpoint, &c.name));
    candidates
}

/// Log the scored candidate table (also backs `--list-devices`)
pub fn list_candidates() {
    let candidates = enumerate_candidates();
    if candidates.is_empty() {
        warn!("No qualifying keyboards found");
        return;
    }
    info!("Candidate keyboards:");
    for c in &candidates {
        info!(
            "  score: {:>3} | endpoint: {} | name: {}",
            c.score,
            c.endpoint.map_or("N/A".to_string(), |e| e.to_string()),
            c.name
        );
    }
}

/// Select the best qualifying keyboard, switch it to non-blocking reads and
/// grab it exclusively.
pub fn select_and_grab() -> Result<CapturedDevice, DeviceError> {
    let mut candidates = enumerate_candidates();
    if candidates.is_empty() {
        return Err(DeviceError::NoKeyboardFound);
    }

    info!("Found {} candidate keyboard(s):", candidates.len());
    for c in &candidates {
        info!(
            "  score: {:>3} | endpoint: {} | name: {}",
            c.score,
            c.endpoint.map_or("N/A".to_string(), |e| e.to_string()),
            c.name
        );
    }

    let best = candidates.remove(0);
    let mut device = best.device;

    if let Err(e) = set_nonblocking(&device) {
        return Err(DeviceError::GrabFailed {
            name: best.name,
            source: e,
        });
    }

    if let Err(e) = device.grab() {
        warn!("Failed to grab '{}': {}", best.name, e);
        return Err(DeviceError::GrabFailed {
            name: best.name,
            source: e,
        });
    }

    info!("Grabbed keyboard: {}", best.name);
    Ok(CapturedDevice {
        device,
        name: best.name,
    })
}

/// Put the device fd in non-blocking mode, preserving existing flags
fn set_nonblocking(device: &Device) -> std::io::Result<()> {
    let fd = device.as_raw_fd();
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}
