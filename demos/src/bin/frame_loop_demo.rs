//! # Frame Loop Demo
//!
//! Drives the threaded render pipeline through a short simulated session:
//! a loading phase with the overlay worker active, then a steady-state
//! frame loop, then a flush and shutdown. Commands are logged instead of
//! hitting a GPU.

use std::time::Duration;

use vermilion_pipeline::{
    CommandError, CommandExecutor, LoadingPolicy, PipelineConfig, RenderPipeline, ThreadedPipeline,
};

const CMD_CLEAR: u32 = 0x0000_0001;
const CMD_DRAW: u32 = 0x0000_0002;
const CMD_PRESENT: u32 = 0x0000_0003;
const CMD_OVERLAY: u32 = 0x0000_0010;

/// Executor that logs each command and simulates GPU work with a sleep.
struct LoggingExecutor {
    label: &'static str,
}

impl CommandExecutor for LoggingExecutor {
    fn execute(&mut self, kind: u32, payload: &[u8]) -> Result<(), CommandError> {
        log::debug!(
            "[{}] executing command {kind:#010x} ({} payload bytes)",
            self.label,
            payload.len()
        );
        std::thread::sleep(Duration::from_millis(1));
        Ok(())
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("vermilion pipeline {}", vermilion_pipeline::VERSION);

    let config = PipelineConfig {
        ring_slots: 3,
        loading: LoadingPolicy {
            min_cores: 2,
            headless: false,
            editor: false,
        },
        ..Default::default()
    };
    let mut pipeline = ThreadedPipeline::spawn(config, LoggingExecutor { label: "render" })
        .expect("failed to spawn render worker");
    pipeline.set_loading_executor(|| Box::new(LoggingExecutor { label: "loading" }));

    // Loading phase: the overlay worker keeps a progress screen alive
    // while the main thread "streams assets".
    pipeline.switch_mode(true);
    for step in 0..10u32 {
        std::thread::sleep(Duration::from_millis(5)); // asset streaming
        pipeline.enqueue_loading(CMD_OVERLAY, &step.to_le_bytes());
        pipeline.advance_loading();
    }
    pipeline.switch_mode(false);
    log::info!("loading finished; entering frame loop");

    // Steady-state frame loop.
    for frame in 0..60u32 {
        pipeline.enqueue(CMD_CLEAR, &[]);
        for object in 0..8u32 {
            let mut payload = [0u8; 8];
            payload[..4].copy_from_slice(&frame.to_le_bytes());
            payload[4..].copy_from_slice(&object.to_le_bytes());
            pipeline.enqueue(CMD_DRAW, &payload);
        }
        pipeline.enqueue(CMD_PRESENT, &[]);
        pipeline.advance();
    }

    pipeline.request_flush();
    let timings = pipeline.frame_timings();
    log::info!(
        "last frame: {} commands, render {:?}, waited on render {:?}",
        timings.commands_processed,
        timings.render_time,
        timings.wait_for_render
    );
    pipeline.quit();
}
