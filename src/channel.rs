//! Event handoff between capture and dispatch
//!
//! Single-producer single-consumer FIFO. Push never blocks; pop blocks with
//! a bounded timeout and returns early on shutdown so neither loop can hang.

use crate::event::InputEvent;
use crate::shutdown::ShutdownToken;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct EventChannel {
    queue: Mutex<VecDeque<InputEvent>>,
    available: Condvar,
    shutdown: ShutdownToken,
}

impl EventChannel {
    pub fn new(shutdown: ShutdownToken) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown,
        }
    }

    /// Enqueue an event and wake one waiting consumer. Unbounded.
    pub fn push(&self, event: InputEvent) {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        queue.push_back(event);
        self.available.notify_one();
    }

    /// Dequeue the next event, waiting up to `timeout`.
    ///
    /// Returns None when the timeout elapses or shutdown has been requested.
    /// Delivery order is exactly push order.
    pub fn pop(&self, timeout: Duration) -> Option<InputEvent> {
        let deadline = Instant::now() + timeout;
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(event) = queue.pop_front() {
                return Some(event);
            }
            if self.shutdown.is_requested() {
                return None;
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .available
                .wait_timeout(queue, deadline - now)
                .unwrap_or_else(|e| e.into_inner());
            queue = guard;
        }
    }

    /// Wake any blocked consumer so it can observe the shutdown token
    pub fn wake_all(&self) {
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
