//! Event capture loop
//!
//! Owns the grabbed device for the process lifetime. Each cycle drains the
//! non-blocking fd, feeds the repeat and emergency state machines, expires
//! stuck keys and sleeps briefly. Classified events go over the channel to
//! the dispatcher; modifier state is published through the shared mutex.

pub mod emergency;
pub mod repeat;

use crate::channel::EventChannel;
use crate::device::CapturedDevice;
use crate::event::{modifier_for_code, EventKind, InputEvent, ModifierState};
use crate::shutdown::ShutdownToken;
use emergency::EmergencyExit;
use evdev::InputEventKind;
use log::{debug, info, warn};
use repeat::RepeatTimer;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Sleep between drain cycles
const POLL_SLEEP: Duration = Duration::from_millis(5);

/// Pause after a non-transient read error before trying again
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// A key reported down this long with no release is considered stuck
const STUCK_KEY_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-event classification state, separated from the device so the
/// decisions are testable.
struct CaptureState {
    channel: Arc<EventChannel>,
    modifiers: Arc<Mutex<ModifierState>>,
    repeat: RepeatTimer,
    emergency: EmergencyExit,
    /// Data keys currently down, with their press time
    held: HashMap<u16, Instant>,
}

impl CaptureState {
    fn new(
        channel: Arc<EventChannel>,
        modifiers: Arc<Mutex<ModifierState>>,
        repeat: RepeatTimer,
    ) -> Self {
        Self {
            channel,
            modifiers,
            repeat,
            emergency: EmergencyExit::new(),
            held: HashMap::new(),
        }
    }

    /// Classify one raw key event. Returns true when the emergency chord
    /// completed and the process must terminate immediately.
    fn handle_key(&mut self, key_code: u16, value: i32, now: Instant) -> bool {
        if self.emergency.observe(key_code, value, now) {
            return true;
        }

        // Native auto-repeat is discarded; the repeat timer is the single
        // source of repetition.
        if value == 2 {
            return false;
        }

        let active = value == 1;

        if let Some(modifier) = modifier_for_code(key_code) {
            {
                let mut mods = self.modifiers.lock().unwrap_or_else(|e| e.into_inner());
                mods.set(modifier, active);
            }
            self.channel
                .push(InputEvent::new(EventKind::ModifierChanged, key_code, active, value));
            self.channel
                .push(InputEvent::new(EventKind::RawKey, key_code, active, value));
            return false;
        }

        if active {
            self.held.insert(key_code, now);
            self.repeat.arm(key_code, now);
            self.channel
                .push(InputEvent::new(EventKind::Press, key_code, true, value));
        } else {
            self.held.remove(&key_code);
            self.repeat.disarm(key_code);
            self.channel
                .push(InputEvent::new(EventKind::Release, key_code, false, value));
        }
        false
    }

    /// Fire a due repeat and drop keys that have been down implausibly long
    fn tick(&mut self, now: Instant) {
        if let Some(key_code) = self.repeat.check(now) {
            self.channel
                .push(InputEvent::new(EventKind::Repeat, key_code, true, 2));
        }

        // Diagnostic only: a key can legitimately stay down this long
        // (held backspace), so the repeat timer is left armed. The entry is
        // dropped from the held map so the warning fires once per press.
        let stuck: Vec<u16> = self
            .held
            .iter()
            .filter(|(_, pressed)| now.duration_since(**pressed) > STUCK_KEY_TIMEOUT)
            .map(|(code, _)| *code)
            .collect();
        for key_code in stuck {
            warn!("Key {} held over {:?}, dropping from tracking", key_code, STUCK_KEY_TIMEOUT);
            self.held.remove(&key_code);
        }
    }
}

pub struct EventCaptureLoop {
    device: CapturedDevice,
    state: CaptureState,
    shutdown: ShutdownToken,
}

impl EventCaptureLoop {
    pub fn new(
        device: CapturedDevice,
        channel: Arc<EventChannel>,
        modifiers: Arc<Mutex<ModifierState>>,
        shutdown: ShutdownToken,
        initial_delay: Duration,
        repeat_interval: Duration,
    ) -> Self {
        let repeat = RepeatTimer::new(initial_delay, repeat_interval);
        Self {
            device,
            state: CaptureState::new(channel, modifiers, repeat),
            shutdown,
        }
    }

    /// Run until shutdown is requested. Consumes the loop; the device is
    /// released when this returns.
    pub fn run(mut self) {
        info!("Capture loop started on '{}'", self.device.name());

        while !self.shutdown.is_requested() {
            match self.device.device_mut().fetch_events() {
                Ok(events) => {
                    let now = Instant::now();
                    for event in events {
                        let InputEventKind::Key(key) = event.kind() else {
                            continue;
                        };
                        if self.state.handle_key(key.code(), event.value(), now) {
                            warn!("Emergency exit chord detected, terminating");
                            // Unconditional: no unwinding, no shutdown path
                            unsafe { libc::_exit(0) };
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    warn!("Device read error: {}, backing off", e);
                    std::thread::sleep(ERROR_BACKOFF);
                    continue;
                }
            }

            self.state.tick(Instant::now());
            std::thread::sleep(POLL_SLEEP);
        }

        debug!("Capture loop stopped");
    }
}
