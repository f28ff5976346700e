//! Blocking signal events.
//!
//! [`SignalEvent`] is a one-shot, CPU-waitable event built on a mutex and
//! condition variable. Worker threads signal it once startup is complete;
//! other threads block on [`SignalEvent::wait`] until then.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A one-shot blocking event.
///
/// Starts unsignaled. Any number of threads may wait; once signaled, all
/// current and future waiters return immediately. Signaling again is a
/// no-op.
#[derive(Debug, Default)]
pub struct SignalEvent {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl SignalEvent {
    /// Create a new event in the unsignaled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the event has been signaled (non-blocking).
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Signal the event, waking all waiters.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.condvar.notify_all();
    }

    /// Block until the event is signaled.
    ///
    /// Returns immediately if already signaled.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.condvar.wait(&mut signaled);
        }
    }

    /// Block until the event is signaled or the timeout elapses.
    ///
    /// Returns `true` if the event was signaled, `false` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.condvar.wait_until(&mut signaled, deadline).timed_out() {
                return *signaled;
            }
        }
        true
    }
}
