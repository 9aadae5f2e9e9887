//! Emergency-exit chord detection
//!
//! The one fail-safe against a stuck modifier or a malfunctioning grabbed
//! device: pressing Ctrl, Alt, Esc in order (each within a second of the
//! previous match) requests immediate, unconditional process termination.

use evdev::Key;
use std::time::{Duration, Instant};

/// Gap allowed between consecutive chord matches
const CHORD_WINDOW: Duration = Duration::from_secs(1);

/// The chord, in required order
const CHORD: [u16; 3] = [
    Key::KEY_LEFTCTRL.0,
    Key::KEY_LEFTALT.0,
    Key::KEY_ESC.0,
];

#[derive(Debug)]
pub struct EmergencyExit {
    sequence: Vec<u16>,
    last_match: Option<Instant>,
}

impl EmergencyExit {
    pub fn new() -> Self {
        Self {
            sequence: Vec::with_capacity(CHORD.len()),
            last_match: None,
        }
    }

    /// Feed a raw key event. Returns true when the full chord has been
    /// entered and the process must terminate now.
    pub fn observe(&mut self, key_code: u16, value: i32, now: Instant) -> bool {
        // Stale progress is discarded before anything else
        if self
            .last_match
            .is_some_and(|t| now.duration_since(t) > CHORD_WINDOW)
        {
            self.sequence.clear();
        }

        // Only key-down events advance the chord
        if value != 1 {
            return false;
        }

        if !CHORD.contains(&key_code) {
            return false;
        }

        // Held keys re-report on some devices; ignore immediate duplicates
        if self.sequence.last() != Some(&key_code) {
            self.sequence.push(key_code);
        }
        self.last_match = Some(now);

        self.sequence == CHORD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chord_in_order_fires() {
        let mut exit = EmergencyExit::new();
        let now = Instant::now();
        assert!(!exit.observe(CHORD[0], 1, now));
        assert!(!exit.observe(CHORD[1], 1, now + Duration::from_millis(100)));
        assert!(exit.observe(CHORD[2], 1, now + Duration::from_millis(200)));
    }

    #[test]
    fn test_wrong_order_does_not_fire() {
        let mut exit = EmergencyExit::new();
        let now = Instant::now();
        assert!(!exit.observe(CHORD[1], 1, now));
        assert!(!exit.observe(CHORD[0], 1, now));
        assert!(!exit.observe(CHORD[2], 1, now));
    }

    #[test]
    fn test_gap_over_one_second_resets() {
        let mut exit = EmergencyExit::new();
        let now = Instant::now();
        assert!(!exit.observe(CHORD[0], 1, now));
        assert!(!exit.observe(CHORD[1], 1, now + Duration::from_millis(500)));
        // Esc arrives too late; progress restarts from just this key
        assert!(!exit.observe(
            CHORD[2],
            1,
            now + Duration::from_millis(1600)
        ));
        // Even completing the rest afterwards is out of order now
        assert!(!exit.observe(CHORD[0], 1, now + Duration::from_millis(1700)));
        assert!(!exit.observe(CHORD[1], 1, now + Duration::from_millis(1800)));
    }

    #[test]
    fn test_repeated_key_does_not_duplicate_progress() {
        let mut exit = EmergencyExit::new();
        let now = Instant::now();
        assert!(!exit.observe(CHORD[0], 1, now));
        assert!(!exit.observe(CHORD[0], 1, now + Duration::from_millis(50)));
        assert!(!exit.observe(CHORD[1], 1, now + Duration::from_millis(100)));
        assert!(exit.observe(CHORD[2], 1, now + Duration::from_millis(150)));
    }

    #[test]
    fn test_release_events_are_ignored() {
        let mut exit = EmergencyExit::new();
        let now = Instant::now();
        assert!(!exit.observe(CHORD[0], 1, now));
        assert!(!exit.observe(CHORD[0], 0, now + Duration::from_millis(10)));
        assert!(!exit.observe(CHORD[1], 1, now + Duration::from_millis(20)));
        assert!(exit.observe(CHORD[2], 1, now + Duration::from_millis(30)));
    }

    #[test]
    fn test_restart_after_reset_can_fire() {
        let mut exit = EmergencyExit::new();
        let now = Instant::now();
        assert!(!exit.observe(CHORD[0], 1, now));
        let later = now + Duration::from_secs(3);
        assert!(!exit.observe(CHORD[0], 1, later));
        assert!(!exit.observe(CHORD[1], 1, later + Duration::from_millis(100)));
        assert!(exit.observe(CHORD[2], 1, later + Duration::from_millis(200)));
    }
}
