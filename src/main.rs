//! keylayer - layered user-space keyboard remapper for Linux
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  /dev/input/event* (exclusive grab)      │
//! │        ↓ capture thread                  │
//! │  EventCaptureLoop → EventChannel         │
//! │        ↓ dispatch (main thread)          │
//! │  Dispatcher → LayerEngine                │
//! │        ↓                                 │
//! │  OutputSink (uinput virtual keyboard)    │
//! └──────────────────────────────────────────┘
//! ```

mod capture;
mod channel;
mod config;
mod device;
mod dispatch;
mod event;
mod layout;
mod output;
mod shutdown;

use anyhow::{Context, Result};
use capture::EventCaptureLoop;
use channel::EventChannel;
use config::Config;
use dispatch::Dispatcher;
use event::ModifierState;
use layout::{FileStateStore, LayerEngine, Layout, PersistedState};
use log::{info, warn};
use output::{OutputSink, VirtualKeyboard};
use shutdown::ShutdownToken;
use std::sync::{Arc, Mutex};

/// Print help message
fn print_help() {
    println!(
        r#"keylayer {} - layered keyboard remapper for Linux

USAGE:
    keylayer [OPTIONS]

OPTIONS:
    -h, --help         Print this help message
    -V, --version      Print version information
    --list-devices     Print scored keyboard candidates and exit
    --init-config      Generate config file and starter layout

Requires read access to /dev/input and write access to /dev/uinput.
Emergency exit at any time: press Left Ctrl, Left Alt, Esc in order."#,
        env!("CARGO_PKG_VERSION")
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();

    // --help
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    // --version
    if args.iter().any(|a| a == "--version" || a == "-V") {
        println!("keylayer {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Config file generation mode
    if args.iter().any(|a| a == "--init-config") {
        let path = Config::write_template()?;
        println!("Config ready: {}", path.display());
        return Ok(());
    }

    // Inspection mode: score and print candidates without grabbing
    if args.iter().any(|a| a == "--list-devices") {
        device::list_candidates();
        return Ok(());
    }

    info!("keylayer starting...");
    let config = Config::load();

    let state_path = config.state_path().context("Config directory not found")?;
    let state = PersistedState::load(&state_path);
    info!("Active layout: {}, base layer: {}", state.layout, state.layer);

    let layout_path = config
        .layout_path(&state.layout)
        .context("Config directory not found")?;
    let layout = Layout::load(&layout_path)
        .with_context(|| format!("Failed to load layout {}", layout_path.display()))?;
    info!(
        "Layout loaded: {} keys, {} layer key(s)",
        layout.key_count(),
        layout.layer_key_count()
    );
    let report = layout.verify_layer_keys();
    for (pos, symbol) in &report.unconfigured {
        warn!(
            "Base position {}: '{}' looks like a layer key but has no layer_keys entry",
            pos, symbol
        );
    }
    for key in &report.missing_from_layout {
        warn!("Layer key '{}' does not appear in the base layer", key);
    }

    let keyboard = device::select_and_grab().context("Keyboard acquisition failed")?;
    let sink = VirtualKeyboard::new().context("Virtual keyboard creation failed")?;

    shutdown::install_signal_handlers();
    let token = ShutdownToken::new();
    let channel = Arc::new(EventChannel::new(token.clone()));
    let modifiers = Arc::new(Mutex::new(ModifierState::default()));

    let capture_loop = EventCaptureLoop::new(
        keyboard,
        channel.clone(),
        modifiers.clone(),
        token.clone(),
        config.repeat.initial_delay(),
        config.repeat.interval(),
    );
    let capture_thread = std::thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || capture_loop.run())
        .context("Failed to spawn capture thread")?;

    let engine = LayerEngine::new(layout, state, Box::new(FileStateStore::new(state_path)));
    let dispatcher = Dispatcher::new(channel.clone(), engine, modifiers, sink);

    info!("Remapping active (Ctrl+Alt+Esc for emergency exit)");
    let mut sink = dispatcher.run(&token);

    // Graceful shutdown: stop both loops, then make sure no virtual
    // modifier is left pressed.
    info!("Shutting down...");
    token.request();
    channel.wake_all();
    if capture_thread.join().is_err() {
        warn!("Capture thread panicked during shutdown");
    }
    sink.release_all_modifiers();
    info!("keylayer exited cleanly");

    Ok(())
}
