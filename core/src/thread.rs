//! Owned worker threads.
//!
//! [`OwnedThread`] wraps a named OS thread and guarantees join-on-drop, so
//! a worker can never outlive the structure that spawned it. Cooperative
//! shutdown (quit flags, wakeups) is the caller's responsibility; this
//! type only owns the handle.

use std::thread::JoinHandle;

/// A named OS thread that is joined when dropped.
///
/// Dropping an `OwnedThread` blocks until the thread exits. Callers must
/// request shutdown through their own signaling before dropping, otherwise
/// the drop blocks for as long as the thread keeps running.
#[derive(Debug)]
pub struct OwnedThread {
    name: String,
    handle: Option<JoinHandle<()>>,
}

impl OwnedThread {
    /// Spawn a named thread running `f`.
    pub fn spawn<F>(name: impl Into<String>, f: F) -> std::io::Result<Self>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = std::thread::Builder::new().name(name.clone()).spawn(f)?;
        Ok(Self {
            name,
            handle: Some(handle),
        })
    }

    /// The thread's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has finished running (non-blocking).
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Join the thread, consuming the handle.
    ///
    /// Returns `Err` if the thread panicked.
    pub fn join(mut self) -> std::thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

impl Drop for OwnedThread {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("thread '{}' panicked before join", self.name);
            }
        }
    }
}
