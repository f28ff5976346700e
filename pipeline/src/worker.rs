//! Consumer worker threads.
//!
//! A [`Worker`] drains ring slots on a dedicated OS thread, executing each
//! slot's commands strictly in enqueue order through a [`CommandExecutor`].
//! Per-command recoverable failures are logged and counted; a fatal failure
//! (device-lost class) stops the worker and surfaces on a separate
//! fatal-error channel the producer can poll.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use vermilion_core::{OwnedThread, SignalEvent};

use crate::command::CommandBuffer;
use crate::error::{CommandError, PipelineError};
use crate::flush::FlushBarrier;
use crate::guard::{ThreadRole, ThreadRoleTable};
use crate::ring::CommandRing;
use crate::telemetry::Telemetry;

/// Lifecycle states of a consumer worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Constructed, thread not yet scheduled.
    Created = 0,
    /// Thread running startup (role registration, executor hook).
    Starting = 1,
    /// Draining slots normally.
    Running = 2,
    /// Stop requested; finishing the in-flight slot.
    Draining = 3,
    /// Exited; no further slots will be consumed.
    Stopped = 4,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Callback executing decoded render commands on the worker thread.
///
/// Implemented by the rendering subsystem; the pipeline treats payload
/// bytes as opaque.
pub trait CommandExecutor {
    /// Invoked once on the worker thread before any command executes.
    ///
    /// Debug/crash-dump registration hooks belong here; the pipeline has
    /// already named the thread and registered its role.
    fn on_thread_start(&mut self, role: ThreadRole) {
        let _ = role;
    }

    /// Execute one decoded command.
    fn execute(&mut self, kind: u32, payload: &[u8]) -> Result<(), CommandError>;

    /// GPU time attributable to the slot just executed.
    ///
    /// Polled once after each slot; only the graphics backend can know
    /// this, so the default is zero.
    fn gpu_time_this_slot(&mut self) -> Duration {
        Duration::ZERO
    }
}

/// State shared between a worker thread and its owner.
#[derive(Debug, Default)]
struct WorkerShared {
    state: AtomicU8,
    quit: AtomicBool,
    fatal: Mutex<Option<PipelineError>>,
    started: SignalEvent,
}

/// An owned consumer worker bound to one ring.
pub(crate) struct Worker {
    shared: Arc<WorkerShared>,
    ring: Arc<CommandRing>,
    thread: Option<OwnedThread>,
}

impl Worker {
    /// Spawn a worker draining `ring` with `executor`.
    ///
    /// The worker registers `role`, names its thread, runs the executor's
    /// thread-start hook, then signals startup completion; call
    /// [`wait_started`](Self::wait_started) before enqueueing.
    pub fn spawn(
        role: ThreadRole,
        ring: Arc<CommandRing>,
        barrier: Arc<FlushBarrier>,
        telemetry: Arc<Telemetry>,
        roles: Arc<ThreadRoleTable>,
        mut executor: Box<dyn CommandExecutor + Send>,
    ) -> std::io::Result<Self> {
        let shared = Arc::new(WorkerShared::default());
        let thread = {
            let shared = shared.clone();
            let ring = ring.clone();
            OwnedThread::spawn(role.label(), move || {
                run_worker(role, &shared, &ring, &barrier, &telemetry, &roles, executor.as_mut());
            })?
        };
        Ok(Self {
            shared,
            ring,
            thread: Some(thread),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Whether the worker is still consuming slots.
    pub fn is_alive(&self) -> bool {
        self.state() != WorkerState::Stopped
    }

    /// Block until the worker has finished startup.
    pub fn wait_started(&self) {
        self.shared.started.wait();
    }

    /// Request cooperative shutdown. Idempotent.
    ///
    /// The worker finishes its in-flight slot before exiting; already
    /// published but unstarted slots are not consumed.
    pub fn stop(&self) {
        if !self.shared.quit.swap(true, Ordering::AcqRel) {
            self.ring.notify_consumer();
        }
    }

    /// Take the fatal error that stopped the worker, if any.
    pub fn take_fatal_error(&self) -> Option<PipelineError> {
        self.shared.fatal.lock().take()
    }

    /// Stop the worker and join its thread.
    pub fn join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render worker thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // OwnedThread joins on drop; make sure the loop is told to exit.
        self.stop();
    }
}

fn run_worker(
    role: ThreadRole,
    shared: &WorkerShared,
    ring: &CommandRing,
    barrier: &FlushBarrier,
    telemetry: &Telemetry,
    roles: &ThreadRoleTable,
    executor: &mut dyn CommandExecutor,
) {
    shared.state.store(WorkerState::Starting as u8, Ordering::Release);
    roles.register(role);
    vermilion_core::set_thread_name!(role.label());
    executor.on_thread_start(role);
    shared.started.signal();
    shared.state.store(WorkerState::Running as u8, Ordering::Release);
    log::debug!("{} worker running", role.label());

    while let Some(buffer) = ring.take_ready(&shared.quit, telemetry) {
        let fatal = execute_slot(shared, telemetry, executor, &buffer);
        match fatal {
            None => ring.complete(buffer, barrier),
            Some(error) => {
                // Fatal: stop immediately without draining; the producer is
                // notified on the fatal channel and the stopped barrier.
                log::error!("{} worker stopping: {error}", role.label());
                *shared.fatal.lock() = Some(error);
                break;
            }
        }
    }

    shared.state.store(WorkerState::Stopped as u8, Ordering::Release);
    ring.mark_stopped();
    barrier.mark_stopped();
    // In case startup raced a stop request.
    shared.started.signal();
    log::debug!("{} worker stopped", role.label());
}

/// Execute every command of one slot in enqueue order.
///
/// Returns the fatal error that aborted the slot, or `None` when the slot
/// ran to completion (individual recoverable failures included).
fn execute_slot(
    shared: &WorkerShared,
    telemetry: &Telemetry,
    executor: &mut dyn CommandExecutor,
    buffer: &CommandBuffer,
) -> Option<PipelineError> {
    vermilion_core::profile_scope!("pipeline: process slot");
    let start = Instant::now();
    let mut fatal = None;

    for (kind, payload) in buffer.reader() {
        // A stop request mid-slot only changes the advertised state; the
        // slot still runs to completion.
        if shared.quit.load(Ordering::Relaxed)
            && shared.state.load(Ordering::Relaxed) == WorkerState::Running as u8
        {
            shared
                .state
                .store(WorkerState::Draining as u8, Ordering::Release);
        }

        match executor.execute(kind, payload) {
            Ok(()) => telemetry.inc_processed(),
            Err(CommandError::DeviceLost) => {
                fatal = Some(PipelineError::DeviceLost);
                break;
            }
            Err(CommandError::Fatal(message)) => {
                fatal = Some(PipelineError::CommandFailed { kind, message });
                break;
            }
            Err(error) => {
                telemetry.inc_failed();
                log::warn!("render command {kind:#010x} failed: {error}");
            }
        }
    }

    telemetry.add_render_time(start.elapsed());
    telemetry.add_gpu_time(executor.gpu_time_this_slot());
    fatal
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct RecordingExecutor {
        kinds: Arc<Mutex<Vec<u32>>>,
        started: Arc<AtomicU32>,
    }

    impl CommandExecutor for RecordingExecutor {
        fn on_thread_start(&mut self, _role: ThreadRole) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }

        fn execute(&mut self, kind: u32, _payload: &[u8]) -> Result<(), CommandError> {
            self.kinds.lock().push(kind);
            Ok(())
        }
    }

    struct FailingExecutor {
        executed: Arc<AtomicU32>,
        fail_on: u32,
        error: CommandError,
    }

    impl CommandExecutor for FailingExecutor {
        fn execute(&mut self, kind: u32, _payload: &[u8]) -> Result<(), CommandError> {
            if kind == self.fail_on {
                return Err(self.error.clone());
            }
            self.executed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn harness() -> (Arc<CommandRing>, Arc<FlushBarrier>, Arc<Telemetry>, Arc<ThreadRoleTable>) {
        (
            Arc::new(CommandRing::new(2, 64, None)),
            Arc::new(FlushBarrier::new()),
            Arc::new(Telemetry::new()),
            Arc::new(ThreadRoleTable::new()),
        )
    }

    #[test]
    fn worker_starts_registers_and_executes() {
        let (ring, barrier, telemetry, roles) = harness();
        let kinds = Arc::new(Mutex::new(Vec::new()));
        let started = Arc::new(AtomicU32::new(0));

        let worker = Worker::spawn(
            ThreadRole::Render,
            ring.clone(),
            barrier.clone(),
            telemetry.clone(),
            roles.clone(),
            Box::new(RecordingExecutor {
                kinds: kinds.clone(),
                started: started.clone(),
            }),
        )
        .unwrap();
        worker.wait_started();
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(roles.registered(ThreadRole::Render).is_some());
        assert_eq!(worker.state(), WorkerState::Running);

        ring.enqueue(10, &[]).unwrap();
        ring.enqueue(20, &[]).unwrap();
        ring.advance(&barrier, &telemetry);
        barrier.wait_drained();
        assert_eq!(*kinds.lock(), vec![10, 20]);

        worker.join();
    }

    #[test]
    fn recoverable_failure_continues_processing() {
        let (ring, barrier, telemetry, roles) = harness();
        let executed = Arc::new(AtomicU32::new(0));

        let worker = Worker::spawn(
            ThreadRole::Render,
            ring.clone(),
            barrier.clone(),
            telemetry.clone(),
            roles,
            Box::new(FailingExecutor {
                executed: executed.clone(),
                fail_on: 2,
                error: CommandError::Failed("missing asset".into()),
            }),
        )
        .unwrap();
        worker.wait_started();

        for kind in [1, 2, 3] {
            ring.enqueue(kind, &[]).unwrap();
        }
        ring.advance(&barrier, &telemetry);
        barrier.wait_drained();

        assert_eq!(executed.load(Ordering::SeqCst), 2);
        let frame = telemetry.end_frame();
        assert_eq!(frame.commands_processed, 2);
        assert_eq!(frame.commands_failed, 1);
        assert!(worker.is_alive());
        assert!(worker.take_fatal_error().is_none());

        worker.join();
    }

    #[test]
    fn fatal_failure_stops_worker_and_reports() {
        let (ring, barrier, telemetry, roles) = harness();
        let executed = Arc::new(AtomicU32::new(0));

        let worker = Worker::spawn(
            ThreadRole::Render,
            ring.clone(),
            barrier.clone(),
            telemetry.clone(),
            roles,
            Box::new(FailingExecutor {
                executed: executed.clone(),
                fail_on: 2,
                error: CommandError::DeviceLost,
            }),
        )
        .unwrap();
        worker.wait_started();

        for kind in [1, 2, 3] {
            ring.enqueue(kind, &[]).unwrap();
        }
        ring.advance(&barrier, &telemetry);

        // The barrier is released by the stop, not by a drain.
        barrier.wait_drained();
        while worker.is_alive() {
            std::thread::yield_now();
        }
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(worker.take_fatal_error(), Some(PipelineError::DeviceLost));
        // Command 3 never ran.
        assert_eq!(executed.load(Ordering::SeqCst), 1);

        worker.join();
    }

    #[test]
    fn stop_is_idempotent() {
        let (ring, barrier, telemetry, roles) = harness();
        let worker = Worker::spawn(
            ThreadRole::Render,
            ring,
            barrier,
            telemetry,
            roles,
            Box::new(FailingExecutor {
                executed: Arc::new(AtomicU32::new(0)),
                fail_on: u32::MAX,
                error: CommandError::Failed(String::new()),
            }),
        )
        .unwrap();
        worker.wait_started();
        worker.stop();
        worker.stop();
        worker.join();
    }
}
