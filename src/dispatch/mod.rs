//! Dispatch loop
//!
//! Drains the event channel and drives the layer engine and the output
//! sink. Raw events mirror straight to the OS; presses and repeats go
//! through character resolution, subject to the shortcut bypass rule.

use crate::channel::EventChannel;
use crate::event::{EventKind, InputEvent, ModifierState};
use crate::layout::LayerEngine;
use crate::output::OutputSink;
use crate::shutdown::ShutdownToken;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bounded wait per pop so the shutdown token is observed promptly
const POP_TIMEOUT: Duration = Duration::from_millis(100);

pub struct Dispatcher<S: OutputSink> {
    channel: Arc<EventChannel>,
    engine: LayerEngine,
    modifiers: Arc<Mutex<ModifierState>>,
    sink: S,
}

impl<S: OutputSink> Dispatcher<S> {
    pub fn new(
        channel: Arc<EventChannel>,
        engine: LayerEngine,
        modifiers: Arc<Mutex<ModifierState>>,
        sink: S,
    ) -> Self {
        Self {
            channel,
            engine,
            modifiers,
            sink,
        }
    }

    /// Run until shutdown, then hand the sink back for final cleanup
    pub fn run(mut self, shutdown: &ShutdownToken) -> S {
        while !shutdown.is_requested() {
            let Some(event) = self.channel.pop(POP_TIMEOUT) else {
                continue;
            };
            self.handle_event(event);
        }
        debug!("Dispatch loop stopped");
        self.sink
    }

    fn handle_event(&mut self, event: InputEvent) {
        match event.kind {
            // Hold layers end on the release of their activating key. The
            // release itself produces no output; modifiers are the only
            // keys mirrored to the OS, via their RawKey events.
            EventKind::Release => {
                self.engine.handle_key_release(event.key_code);
            }
            EventKind::RawKey => {
                self.sink.forward_raw(event.key_code, event.raw_value);
            }
            // Layer-activation keys must be recognized even under bypass,
            // so resolution always runs.
            EventKind::Press | EventKind::Repeat => {
                let resolved = self
                    .engine
                    .process_key_event(&event.key_name, event.key_code);

                let bypass = {
                    let mods = self.modifiers.lock().unwrap_or_else(|e| e.into_inner());
                    mods.bypass_active()
                };
                if bypass {
                    if resolved.is_some() {
                        debug!("Shortcut bypass, discarding output for {}", event.key_name);
                    }
                    return;
                }

                if let Some(ch) = resolved {
                    if !self.sink.send_character(ch) {
                        warn!("Failed to deliver {:?} for {}", ch, event.key_name);
                    }
                }
            }
            EventKind::ModifierChanged => {
                debug!(
                    "Modifier {} now {}",
                    event.key_name,
                    if event.active { "down" } else { "up" }
                );
            }
        }
    }
}
