//! Single-threaded direct-call pipeline.
//!
//! Configuration-time alternative to [`ThreadedPipeline`]: producer and
//! consumer coincide, there is no queue, and every command executes
//! immediately inside [`enqueue`](crate::RenderPipeline::enqueue). Used on
//! single-core targets and in tools that strip the render thread.
//!
//! [`ThreadedPipeline`]: crate::ThreadedPipeline

use std::time::Instant;

use crate::error::{CommandError, PipelineError};
use crate::pipeline::RenderPipeline;
use crate::telemetry::{FrameTimings, Telemetry};
use crate::worker::CommandExecutor;

/// Pipeline that executes commands immediately on the caller thread.
///
/// Ordering and failure semantics match the threaded pipeline: commands
/// run in enqueue order, recoverable failures are logged and counted, and
/// a fatal failure stops execution permanently (subsequent commands are
/// dropped, mirroring a stopped worker).
pub struct DirectPipeline<E: CommandExecutor> {
    executor: E,
    telemetry: Telemetry,
    last_frame: FrameTimings,
    stopped: bool,
    fatal: Option<PipelineError>,
}

impl<E: CommandExecutor> DirectPipeline<E> {
    /// Create a direct pipeline around `executor`.
    pub fn new(mut executor: E) -> Self {
        executor.on_thread_start(crate::guard::ThreadRole::Main);
        Self {
            executor,
            telemetry: Telemetry::new(),
            last_frame: FrameTimings::default(),
            stopped: false,
            fatal: None,
        }
    }

    /// Whether a fatal command failure has stopped execution.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Take the fatal error that stopped execution, if any.
    pub fn take_fatal_error(&mut self) -> Option<PipelineError> {
        self.fatal.take()
    }

    /// Access the wrapped executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }
}

impl<E: CommandExecutor> RenderPipeline for DirectPipeline<E> {
    fn enqueue(&mut self, kind: u32, payload: &[u8]) {
        if self.stopped {
            log::debug!("direct pipeline stopped; dropping command {kind:#010x}");
            return;
        }
        let start = Instant::now();
        match self.executor.execute(kind, payload) {
            Ok(()) => self.telemetry.inc_processed(),
            Err(CommandError::DeviceLost) => {
                self.stopped = true;
                self.fatal = Some(PipelineError::DeviceLost);
                log::error!("direct pipeline stopping: GPU device lost");
            }
            Err(CommandError::Fatal(message)) => {
                log::error!("direct pipeline stopping: command {kind:#010x} failed: {message}");
                self.stopped = true;
                self.fatal = Some(PipelineError::CommandFailed { kind, message });
            }
            Err(error) => {
                self.telemetry.inc_failed();
                log::warn!("render command {kind:#010x} failed: {error}");
            }
        }
        self.telemetry.add_render_time(start.elapsed());
    }

    fn advance(&mut self) {
        self.telemetry.add_gpu_time(self.executor.gpu_time_this_slot());
        self.last_frame = self.telemetry.end_frame();
        vermilion_core::frame_mark!();
    }

    fn request_flush(&mut self) {
        // Nothing is ever queued.
    }

    fn switch_mode(&mut self, enable: bool) {
        // No secondary worker exists; the overlay renders inline.
        log::debug!("direct pipeline ignoring loading-mode switch ({enable})");
    }

    fn frame_timings(&self) -> FrameTimings {
        self.last_frame
    }

    fn quit(&mut self) {}
}
