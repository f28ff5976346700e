//! # Vermilion Pipeline
//!
//! Cross-thread render-command pipeline for Vermilion Engine.
//!
//! ## Overview
//!
//! This crate decouples the simulation thread (producer) from a dedicated
//! render thread (consumer) through a bounded, double-buffered ring of
//! serialized command buffers:
//!
//! - [`RenderPipeline`] - Producer-facing interface shared by both executors
//! - [`ThreadedPipeline`] - Ring + dedicated render worker, with backpressure
//!   and a blocking flush fence
//! - [`DirectPipeline`] - Single-threaded direct-call alternative (no queue)
//! - [`CommandExecutor`] - Callback the rendering subsystem implements to
//!   execute decoded commands
//! - Loading-overlay mode: an independent secondary worker active during
//!   asset streaming
//!
//! Commands are opaque byte payloads; within a slot they execute strictly
//! in enqueue order, and slots are consumed strictly in ring order.
//!
//! ## Example
//!
//! ```ignore
//! use vermilion_pipeline::{PipelineConfig, RenderPipeline, ThreadedPipeline};
//!
//! let mut pipeline = ThreadedPipeline::spawn(PipelineConfig::default(), executor)?;
//! loop {
//!     pipeline.enqueue(DRAW, &draw_payload);
//!     pipeline.advance(); // frame boundary
//! }
//! ```

pub mod command;
pub mod config;
pub mod direct;
pub mod error;
pub mod guard;
pub mod loading;
pub mod pipeline;
pub mod telemetry;
pub mod worker;

mod flush;
mod ring;

// Re-export main types for convenience
pub use command::{CommandBuffer, CommandHeader, CommandReader};
pub use config::{LoadingPolicy, PipelineConfig};
pub use direct::DirectPipeline;
pub use error::{CommandError, FatalHandler, PipelineError, default_fatal_handler};
pub use guard::{ThreadRole, ThreadRoleTable};
pub use loading::{LoadingExecutorFactory, ModeState};
pub use pipeline::{RenderPipeline, ThreadedPipeline};
pub use telemetry::FrameTimings;
pub use worker::{CommandExecutor, WorkerState};

/// Pipeline library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
