//! Pipeline facade and the threaded executor.
//!
//! [`RenderPipeline`] is the producer-facing interface shared by the
//! threaded executor here and the single-threaded
//! [`DirectPipeline`](crate::DirectPipeline). There is deliberately no
//! global pipeline instance: a [`ThreadedPipeline`] is an explicit context
//! object, so multiple pipelines can coexist in one process (tests run
//! several concurrently).

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::error::{FatalHandler, PipelineError, default_fatal_handler};
use crate::flush::FlushBarrier;
use crate::guard::{ThreadRole, ThreadRoleTable};
use crate::loading::{LoadingExecutorFactory, ModeController, ModeState};
use crate::ring::CommandRing;
use crate::telemetry::{FrameTimings, Telemetry};
use crate::worker::{CommandExecutor, Worker, WorkerState};

/// Producer-facing render pipeline interface.
///
/// All methods are producer-only. Implementations differ in where commands
/// execute: on a dedicated render thread ([`ThreadedPipeline`]) or
/// immediately on the caller ([`DirectPipeline`](crate::DirectPipeline)).
pub trait RenderPipeline {
    /// Enqueue one serialized command for the current frame.
    ///
    /// `payload` is opaque to the pipeline. Fatal conditions (protocol
    /// violation, allocation failure) route through the fatal handler.
    fn enqueue(&mut self, kind: u32, payload: &[u8]);

    /// Mark the frame boundary, handing the filled slot to the consumer.
    ///
    /// Called once per simulated frame. Blocks when no free slot exists
    /// (backpressure).
    fn advance(&mut self);

    /// Block until every previously published command has executed.
    ///
    /// Returns immediately if the consumer has stopped.
    fn request_flush(&mut self);

    /// Toggle the loading-overlay mode.
    fn switch_mode(&mut self, enable: bool);

    /// Timings and counters for the last completed frame.
    fn frame_timings(&self) -> FrameTimings;

    /// Tear the pipeline down, stopping and joining all workers. Idempotent.
    fn quit(&mut self);
}

/// Render pipeline with a dedicated consumer thread.
///
/// Owns the command ring, the flush barrier, the primary render worker,
/// and the loading-mode controller. The constructing thread is registered
/// as the producer (Main role); `enqueue`/`advance`/`request_flush` from
/// any other thread is a protocol violation.
pub struct ThreadedPipeline {
    ring: Arc<CommandRing>,
    barrier: Arc<FlushBarrier>,
    telemetry: Arc<Telemetry>,
    roles: Arc<ThreadRoleTable>,
    worker: Option<Worker>,
    mode: ModeController,
    fatal: FatalHandler,
    last_frame: FrameTimings,
}

impl ThreadedPipeline {
    /// Spawn a pipeline with the default fatal handler (log and panic).
    pub fn spawn(
        config: PipelineConfig,
        executor: impl CommandExecutor + Send + 'static,
    ) -> std::io::Result<Self> {
        Self::spawn_with(config, executor, default_fatal_handler())
    }

    /// Spawn a pipeline with a custom fatal handler.
    ///
    /// Blocks until the render worker signals startup completion, so
    /// commands enqueued immediately after construction are safe.
    pub fn spawn_with(
        config: PipelineConfig,
        executor: impl CommandExecutor + Send + 'static,
        fatal: FatalHandler,
    ) -> std::io::Result<Self> {
        let ring = Arc::new(CommandRing::new(
            config.effective_ring_slots(),
            config.initial_slot_capacity,
            config.max_slot_capacity,
        ));
        let barrier = Arc::new(FlushBarrier::new());
        let telemetry = Arc::new(Telemetry::new());
        let roles = Arc::new(ThreadRoleTable::new());
        roles.register(ThreadRole::Main);

        let worker = Worker::spawn(
            ThreadRole::Render,
            ring.clone(),
            barrier.clone(),
            telemetry.clone(),
            roles.clone(),
            Box::new(executor),
        )?;
        worker.wait_started();

        let mode = ModeController::new(&config, roles.clone(), telemetry.clone());
        log::info!(
            "render pipeline started ({} slots)",
            config.effective_ring_slots()
        );

        Ok(Self {
            ring,
            barrier,
            telemetry,
            roles,
            worker: Some(worker),
            mode,
            fatal,
            last_frame: FrameTimings::default(),
        })
    }

    /// Install the factory that creates loading-overlay executors.
    ///
    /// Each `switch_mode(true)` activation calls the factory once; without
    /// one, loading mode is unavailable.
    pub fn set_loading_executor(
        &mut self,
        factory: impl Fn() -> Box<dyn CommandExecutor + Send> + Send + Sync + 'static,
    ) {
        let factory: LoadingExecutorFactory = Box::new(factory);
        self.mode.set_factory(factory);
    }

    /// Current loading-overlay mode.
    pub fn mode(&self) -> ModeState {
        self.mode.mode()
    }

    /// Lifecycle state of the primary render worker.
    pub fn worker_state(&self) -> WorkerState {
        self.worker
            .as_ref()
            .map_or(WorkerState::Stopped, |w| w.state())
    }

    /// Whether the primary worker is still consuming slots.
    pub fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| w.is_alive())
    }

    /// Take the fatal error that stopped the primary worker, if any.
    pub fn take_fatal_error(&self) -> Option<PipelineError> {
        self.worker.as_ref().and_then(|w| w.take_fatal_error())
    }

    /// The role table, for embedders registering auxiliary threads.
    pub fn roles(&self) -> &Arc<ThreadRoleTable> {
        &self.roles
    }

    /// Enqueue an overlay command for the loading worker.
    ///
    /// Dropped with a warning while loading mode is not active.
    pub fn enqueue_loading(&mut self, kind: u32, payload: &[u8]) {
        if let Err(error) = self.mode.enqueue(kind, payload) {
            (self.fatal)(&error);
        }
    }

    /// Publish pending overlay commands to the loading worker.
    pub fn advance_loading(&mut self) {
        self.mode.advance();
    }

    fn validate_producer(&self) -> bool {
        match self.roles.validate_producer() {
            Ok(()) => true,
            Err(error) => {
                (self.fatal)(&error);
                false
            }
        }
    }
}

impl RenderPipeline for ThreadedPipeline {
    fn enqueue(&mut self, kind: u32, payload: &[u8]) {
        if !self.validate_producer() {
            return;
        }
        if let Err(error) = self.ring.enqueue(kind, payload) {
            (self.fatal)(&error);
        }
    }

    fn advance(&mut self) {
        if !self.validate_producer() {
            return;
        }
        self.ring.advance(&self.barrier, &self.telemetry);
        self.last_frame = self.telemetry.end_frame();
        vermilion_core::frame_mark!();
    }

    fn request_flush(&mut self) {
        if !self.validate_producer() {
            return;
        }
        vermilion_core::profile_scope!("pipeline: flush");
        let start = std::time::Instant::now();
        self.barrier.wait_drained();
        self.telemetry.add_wait_for_render(start.elapsed());
    }

    fn switch_mode(&mut self, enable: bool) {
        if !self.validate_producer() {
            return;
        }
        self.mode.switch(enable);
    }

    fn frame_timings(&self) -> FrameTimings {
        self.last_frame
    }

    fn quit(&mut self) {
        self.mode.shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join();
            log::info!("render pipeline stopped");
        }
    }
}

impl Drop for ThreadedPipeline {
    fn drop(&mut self) {
        self.quit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use parking_lot::Mutex;

    struct CollectingExecutor(Arc<Mutex<Vec<(u32, Vec<u8>)>>>);

    impl CommandExecutor for CollectingExecutor {
        fn execute(&mut self, kind: u32, payload: &[u8]) -> Result<(), CommandError> {
            self.0.lock().push((kind, payload.to_vec()));
            Ok(())
        }
    }

    fn recording_fatal() -> (FatalHandler, Arc<Mutex<Vec<PipelineError>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let handler: FatalHandler = Arc::new(move |error| {
            seen_clone.lock().push(error.clone());
        });
        (handler, seen)
    }

    #[test]
    fn enqueue_advance_flush_roundtrip() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = ThreadedPipeline::spawn(
            PipelineConfig::default(),
            CollectingExecutor(seen.clone()),
        )
        .unwrap();

        pipeline.enqueue(1, b"one");
        pipeline.enqueue(2, b"two");
        pipeline.advance();
        pipeline.request_flush();

        assert_eq!(
            *seen.lock(),
            vec![(1, b"one".to_vec()), (2, b"two".to_vec())]
        );
        pipeline.quit();
    }

    #[test]
    fn quit_is_idempotent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline =
            ThreadedPipeline::spawn(PipelineConfig::default(), CollectingExecutor(seen)).unwrap();
        pipeline.quit();
        pipeline.quit();
        assert!(!pipeline.is_worker_alive());
    }

    #[test]
    fn allocation_failure_hits_fatal_handler() {
        let (handler, seen) = recording_fatal();
        let config = PipelineConfig {
            initial_slot_capacity: 16,
            max_slot_capacity: Some(16),
            ..Default::default()
        };
        let collected = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline =
            ThreadedPipeline::spawn_with(config, CollectingExecutor(collected), handler).unwrap();

        pipeline.enqueue(1, &[0u8; 64]);

        let errors = seen.lock();
        assert_eq!(errors.len(), 1);
        match &errors[0] {
            PipelineError::AllocationFailed { requested, slot } => {
                assert_eq!(*requested, 8 + 64);
                assert_eq!(*slot, 0);
            }
            other => panic!("expected AllocationFailed, got {other:?}"),
        }
        drop(errors);
        pipeline.quit();
    }

    #[test]
    fn flush_against_stopped_worker_returns() {
        struct LostExecutor;
        impl CommandExecutor for LostExecutor {
            fn execute(&mut self, _kind: u32, _payload: &[u8]) -> Result<(), CommandError> {
                Err(CommandError::DeviceLost)
            }
        }

        let mut pipeline =
            ThreadedPipeline::spawn(PipelineConfig::default(), LostExecutor).unwrap();
        pipeline.enqueue(1, &[]);
        pipeline.advance();

        // The worker dies on the first command; flush must not deadlock.
        pipeline.request_flush();
        while pipeline.is_worker_alive() {
            std::thread::yield_now();
        }
        assert_eq!(pipeline.take_fatal_error(), Some(PipelineError::DeviceLost));
        pipeline.quit();
    }

    #[test]
    fn two_pipelines_coexist() {
        let seen_a = Arc::new(Mutex::new(Vec::new()));
        let seen_b = Arc::new(Mutex::new(Vec::new()));
        let mut a = ThreadedPipeline::spawn(
            PipelineConfig::default(),
            CollectingExecutor(seen_a.clone()),
        )
        .unwrap();
        let mut b = ThreadedPipeline::spawn(
            PipelineConfig::default(),
            CollectingExecutor(seen_b.clone()),
        )
        .unwrap();

        a.enqueue(1, &[]);
        b.enqueue(2, &[]);
        a.advance();
        b.advance();
        a.request_flush();
        b.request_flush();

        assert_eq!(seen_a.lock().len(), 1);
        assert_eq!(seen_b.lock().len(), 1);
    }
}
