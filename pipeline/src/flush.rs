//! Frame-boundary flush fence.
//!
//! [`FlushBarrier`] tracks how many slots the producer has published and
//! how many the consumer has drained. [`FlushBarrier::wait_drained`] blocks
//! the producer until the counts meet, giving the blocking flush protocol:
//! after it returns, every previously published command has executed.

use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct FlushState {
    published: u64,
    drained: u64,
    stopped: bool,
}

/// Counter/condition pair signaled by the consumer on each drain.
#[derive(Debug, Default)]
pub(crate) struct FlushBarrier {
    state: Mutex<FlushState>,
    condvar: Condvar,
}

// Development-build stall threshold. Callers flush only at safe points, so
// a flush this long means the consumer is wedged or overloaded.
const STALL_WARNING_INTERVAL: Duration = Duration::from_secs(1);

impl FlushBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a slot published by the producer.
    pub fn publish(&self) {
        self.state.lock().published += 1;
    }

    /// Record a slot drained by the consumer and wake flush waiters.
    pub fn drain_one(&self) {
        let mut state = self.state.lock();
        state.drained += 1;
        debug_assert!(state.drained <= state.published);
        self.condvar.notify_all();
    }

    /// Mark the consumer stopped, releasing all current and future waiters.
    pub fn mark_stopped(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        self.condvar.notify_all();
    }

    /// Whether the consumer has stopped.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /// Number of published slots not yet drained.
    pub fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.published - state.drained
    }

    /// Block until every published slot has been drained.
    ///
    /// Never deadlocks against a stopped consumer: returns immediately once
    /// the barrier is marked stopped, regardless of pending slots.
    pub fn wait_drained(&self) {
        let mut state = self.state.lock();
        let target = state.published;
        while state.drained < target && !state.stopped {
            if cfg!(debug_assertions) {
                let timed_out = self
                    .condvar
                    .wait_for(&mut state, STALL_WARNING_INTERVAL)
                    .timed_out();
                if timed_out && state.drained < target && !state.stopped {
                    log::warn!(
                        "flush stalled: {} slot(s) still pending",
                        target - state.drained
                    );
                }
            } else {
                self.condvar.wait(&mut state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn no_pending_returns_immediately() {
        let barrier = FlushBarrier::new();
        barrier.wait_drained();
        assert_eq!(barrier.pending(), 0);
    }

    #[test]
    fn waits_until_drained() {
        let barrier = Arc::new(FlushBarrier::new());
        barrier.publish();
        barrier.publish();

        let consumer = {
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                barrier.drain_one();
                std::thread::sleep(Duration::from_millis(10));
                barrier.drain_one();
            })
        };

        barrier.wait_drained();
        assert_eq!(barrier.pending(), 0);
        consumer.join().unwrap();
    }

    #[test]
    fn stopped_consumer_releases_waiter() {
        let barrier = Arc::new(FlushBarrier::new());
        barrier.publish();

        let stopper = {
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                barrier.mark_stopped();
            })
        };

        // Must return despite the pending slot never draining.
        barrier.wait_drained();
        assert!(barrier.is_stopped());
        assert_eq!(barrier.pending(), 1);
        stopper.join().unwrap();
    }

    #[test]
    fn wait_after_stop_is_noop() {
        let barrier = FlushBarrier::new();
        barrier.mark_stopped();
        barrier.publish();
        barrier.wait_drained();
    }

    #[test]
    fn publishes_only_count_once_drained() {
        let barrier = FlushBarrier::new();
        barrier.publish();
        assert_eq!(barrier.pending(), 1);
        barrier.drain_one();
        assert_eq!(barrier.pending(), 0);
    }
}
