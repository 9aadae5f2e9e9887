//! Key-repeat state machine
//!
//! Native evdev auto-repeat is discarded by the capture loop; repetition is
//! driven entirely by this timer so behavior is uniform regardless of the
//! OS auto-repeat settings. At most one key is tracked at a time, and
//! tracking is cleared the instant that key's release is observed.
//!
//! Times are injected so the schedule is testable without sleeping.

use evdev::Key;
use std::time::{Duration, Instant};

/// Acceleration step for backspace/delete
const ACCEL_STEP: Duration = Duration::from_millis(5);

/// Fastest repeat interval the acceleration may reach
const ACCEL_FLOOR: Duration = Duration::from_millis(10);

#[derive(Debug)]
struct ActiveRepeat {
    key_code: u16,
    /// Repeats fired so far; 0 means the initial delay is still pending
    count: u32,
    last_fire: Instant,
    interval: Duration,
}

#[derive(Debug)]
pub struct RepeatTimer {
    active: Option<ActiveRepeat>,
    initial_delay: Duration,
    default_interval: Duration,
}

impl RepeatTimer {
    pub fn new(initial_delay: Duration, default_interval: Duration) -> Self {
        Self {
            active: None,
            initial_delay,
            default_interval,
        }
    }

    /// Start tracking a freshly pressed data key.
    ///
    /// The interval always resets to the default here so backspace/delete
    /// acceleration never leaks into the next key.
    pub fn arm(&mut self, key_code: u16, now: Instant) {
        self.active = Some(ActiveRepeat {
            key_code,
            count: 0,
            last_fire: now,
            interval: self.default_interval,
        });
    }

    /// Stop tracking if `key_code` is the armed key; no-op otherwise
    pub fn disarm(&mut self, key_code: u16) {
        if self.active.as_ref().is_some_and(|a| a.key_code == key_code) {
            self.active = None;
        }
    }

    pub fn armed_key(&self) -> Option<u16> {
        self.active.as_ref().map(|a| a.key_code)
    }

    /// Fire a repeat if one is due: the first after `initial_delay` since
    /// arming, subsequent ones after the current interval since the last
    /// firing. Returns the repeating key code.
    pub fn check(&mut self, now: Instant) -> Option<u16> {
        let active = self.active.as_mut()?;
        let threshold = if active.count == 0 {
            self.initial_delay
        } else {
            active.interval
        };
        if now.duration_since(active.last_fire) < threshold {
            return None;
        }

        active.count += 1;
        active.last_fire = now;

        // Backspace and delete accelerate, everything else stays fixed
        if active.key_code == Key::KEY_BACKSPACE.code()
            || active.key_code == Key::KEY_DELETE.code()
        {
            let shrink = ACCEL_STEP * active.count;
            active.interval = self.default_interval.saturating_sub(shrink).max(ACCEL_FLOOR);
        }

        Some(active.key_code)
    }
}
