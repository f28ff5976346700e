//! Rotating ring of frame command buffers.
//!
//! N fixed slots (N >= 2), one in the fill role, one in the process role.
//! Roles advance monotonically modulo N: the producer publishes the fill
//! slot at each frame boundary and blocks (backpressure) when the next
//! slot has not been drained yet, bounding memory to N slots. Buffer
//! ownership transfers atomically at publish/drain, so a slot's buffer is
//! never concurrently read and written.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::command::CommandBuffer;
use crate::error::PipelineError;
use crate::flush::FlushBarrier;
use crate::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// Drained and available to the producer.
    Free,
    /// Held by the producer for enqueueing.
    Filling,
    /// Published, waiting for the consumer.
    Ready,
    /// Held by the consumer; its buffer is moved out.
    Processing,
}

#[derive(Debug)]
struct Slot {
    buffer: CommandBuffer,
    state: SlotState,
}

#[derive(Debug)]
struct RingInner {
    slots: Vec<Slot>,
    fill: usize,
    process: usize,
    stopped: bool,
}

/// Bounded ring of command buffers shared between producer and consumer.
#[derive(Debug)]
pub(crate) struct CommandRing {
    inner: Mutex<RingInner>,
    /// Signaled when a slot becomes Free (backpressure release).
    slot_freed: Condvar,
    /// Signaled when a slot becomes Ready, and on consumer wakeups.
    slot_ready: Condvar,
}

impl CommandRing {
    /// Create a ring with `slots` buffers (caller enforces `slots >= 2`).
    ///
    /// Slot 0 starts in the fill role; all others start Free.
    pub fn new(slots: usize, initial_capacity: usize, max_capacity: Option<usize>) -> Self {
        debug_assert!(slots >= 2);
        let slots = (0..slots)
            .map(|i| Slot {
                buffer: CommandBuffer::with_capacity(initial_capacity, max_capacity),
                state: if i == 0 {
                    SlotState::Filling
                } else {
                    SlotState::Free
                },
            })
            .collect();
        Self {
            inner: Mutex::new(RingInner {
                slots,
                fill: 0,
                process: 0,
                stopped: false,
            }),
            slot_freed: Condvar::new(),
            slot_ready: Condvar::new(),
        }
    }

    /// Append a command to the current fill slot.
    pub fn enqueue(&self, kind: u32, payload: &[u8]) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock();
        let fill = inner.fill;
        inner.slots[fill]
            .buffer
            .push(kind, payload)
            .map_err(|e| PipelineError::AllocationFailed {
                requested: e.requested,
                slot: fill,
            })
    }

    /// Publish the fill slot and rotate the fill role forward.
    ///
    /// Blocks while the next slot is not yet drained. Producer wait time is
    /// recorded into `telemetry`. Returns without waiting once the consumer
    /// is marked stopped, so a dead worker cannot wedge the producer.
    pub fn advance(&self, barrier: &FlushBarrier, telemetry: &Telemetry) {
        let mut inner = self.inner.lock();
        let fill = inner.fill;
        debug_assert_eq!(inner.slots[fill].state, SlotState::Filling);
        inner.slots[fill].state = SlotState::Ready;
        barrier.publish();
        self.slot_ready.notify_one();

        let next = (fill + 1) % inner.slots.len();
        inner.fill = next;
        if inner.slots[next].state != SlotState::Free && !inner.stopped {
            let start = Instant::now();
            while inner.slots[next].state != SlotState::Free && !inner.stopped {
                self.slot_freed.wait(&mut inner);
            }
            telemetry.add_wait_for_render(start.elapsed());
        }
        inner.slots[next].state = SlotState::Filling;
    }

    /// Consumer: block until the process slot is Ready, then take its buffer.
    ///
    /// Returns `None` once `quit` is set; a slot already being executed is
    /// unaffected (it was taken before the flag was observed). Consumer
    /// wait time is recorded into `telemetry`.
    pub fn take_ready(&self, quit: &AtomicBool, telemetry: &Telemetry) -> Option<CommandBuffer> {
        let mut inner = self.inner.lock();
        let start = Instant::now();
        loop {
            if quit.load(Ordering::Acquire) {
                return None;
            }
            let process = inner.process;
            if inner.slots[process].state == SlotState::Ready {
                inner.slots[process].state = SlotState::Processing;
                let buffer = std::mem::take(&mut inner.slots[process].buffer);
                telemetry.add_wait_for_main(start.elapsed());
                return Some(buffer);
            }
            self.slot_ready.wait(&mut inner);
        }
    }

    /// Consumer: return a fully executed buffer, freeing its slot.
    ///
    /// Resets the buffer's used length (capacity kept), marks the slot
    /// Free, advances the process role, and signals both the backpressure
    /// waiters and the flush barrier.
    pub fn complete(&self, mut buffer: CommandBuffer, barrier: &FlushBarrier) {
        buffer.clear();
        let mut inner = self.inner.lock();
        let process = inner.process;
        debug_assert_eq!(inner.slots[process].state, SlotState::Processing);
        inner.slots[process].buffer = buffer;
        inner.slots[process].state = SlotState::Free;
        inner.process = (process + 1) % inner.slots.len();
        self.slot_freed.notify_all();
        barrier.drain_one();
    }

    /// Mark the consumer stopped and release every waiter.
    pub fn mark_stopped(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        self.slot_freed.notify_all();
        self.slot_ready.notify_all();
    }

    /// Wake the consumer so it can observe a freshly set quit flag.
    pub fn notify_consumer(&self) {
        let _inner = self.inner.lock();
        self.slot_ready.notify_all();
    }

    /// Bytes currently enqueued in the fill slot.
    #[cfg(test)]
    pub fn fill_len(&self) -> usize {
        let inner = self.inner.lock();
        inner.slots[inner.fill].buffer.len()
    }
}
