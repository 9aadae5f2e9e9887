//! Cooperative shutdown signaling
//!
//! Both loops observe an explicit token instead of ambient global state.
//! SIGINT/SIGTERM flip one process-wide atomic that every token clone
//! wraps; the handler itself does nothing else (async-signal-safe).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

static SIGNAL_RECEIVED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: libc::c_int) {
    SIGNAL_RECEIVED.store(true, Ordering::SeqCst);
}

/// Cancellation token shared by the capture loop, channel and dispatcher
#[derive(Clone)]
pub struct ShutdownToken {
    requested: Arc<AtomicBool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst) || SIGNAL_RECEIVED.load(Ordering::SeqCst)
    }
}

/// Install SIGINT/SIGTERM handlers that mark the token as requested
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
    }
}
