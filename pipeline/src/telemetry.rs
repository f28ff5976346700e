//! Per-frame pipeline instrumentation.
//!
//! Four scalar timers plus command counters, accumulated across one frame
//! and reset at the frame boundary. The producer writes the wait-for-render
//! timer, the consumer writes the rest; an external profiling overlay reads
//! snapshots through [`FrameTimings`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of one frame's accumulated timings and counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimings {
    /// Time the consumer spent waiting for a filled slot.
    pub wait_for_main: Duration,
    /// Time the producer spent blocked on backpressure or flush.
    pub wait_for_render: Duration,
    /// CPU time the consumer spent executing commands.
    pub render_time: Duration,
    /// GPU time attributed to executed slots, as reported by the executor.
    pub gpu_time: Duration,
    /// Commands executed successfully.
    pub commands_processed: u64,
    /// Commands that failed recoverably.
    pub commands_failed: u64,
}

/// Shared accumulators behind the per-frame snapshot.
///
/// Writers add with relaxed atomics; the frame-boundary swap in
/// [`end_frame`](Telemetry::end_frame) is approximate for values written
/// concurrently across the boundary, which is acceptable for telemetry.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    wait_for_main_ns: AtomicU64,
    wait_for_render_ns: AtomicU64,
    render_time_ns: AtomicU64,
    gpu_time_ns: AtomicU64,
    commands_processed: AtomicU64,
    commands_failed: AtomicU64,
}

fn as_ns(duration: Duration) -> u64 {
    duration.as_nanos().min(u64::MAX as u128) as u64
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_wait_for_main(&self, duration: Duration) {
        self.wait_for_main_ns
            .fetch_add(as_ns(duration), Ordering::Relaxed);
    }

    pub fn add_wait_for_render(&self, duration: Duration) {
        self.wait_for_render_ns
            .fetch_add(as_ns(duration), Ordering::Relaxed);
    }

    pub fn add_render_time(&self, duration: Duration) {
        self.render_time_ns
            .fetch_add(as_ns(duration), Ordering::Relaxed);
    }

    pub fn add_gpu_time(&self, duration: Duration) {
        self.gpu_time_ns
            .fetch_add(as_ns(duration), Ordering::Relaxed);
    }

    pub fn inc_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Take the frame's accumulators, resetting them to zero.
    pub fn end_frame(&self) -> FrameTimings {
        let timings = FrameTimings {
            wait_for_main: Duration::from_nanos(self.wait_for_main_ns.swap(0, Ordering::Relaxed)),
            wait_for_render: Duration::from_nanos(
                self.wait_for_render_ns.swap(0, Ordering::Relaxed),
            ),
            render_time: Duration::from_nanos(self.render_time_ns.swap(0, Ordering::Relaxed)),
            gpu_time: Duration::from_nanos(self.gpu_time_ns.swap(0, Ordering::Relaxed)),
            commands_processed: self.commands_processed.swap(0, Ordering::Relaxed),
            commands_failed: self.commands_failed.swap(0, Ordering::Relaxed),
        };

        vermilion_core::profile_plot!(
            "pipeline: wait for render (ms)",
            timings.wait_for_render.as_secs_f64() * 1000.0
        );
        vermilion_core::profile_plot!(
            "pipeline: render time (ms)",
            timings.render_time.as_secs_f64() * 1000.0
        );
        vermilion_core::profile_plot!("pipeline: commands", timings.commands_processed);

        timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_and_resets_per_frame() {
        let telemetry = Telemetry::new();
        telemetry.add_render_time(Duration::from_millis(4));
        telemetry.add_render_time(Duration::from_millis(3));
        telemetry.add_wait_for_render(Duration::from_millis(1));
        telemetry.inc_processed();
        telemetry.inc_processed();
        telemetry.inc_failed();

        let frame = telemetry.end_frame();
        assert_eq!(frame.render_time, Duration::from_millis(7));
        assert_eq!(frame.wait_for_render, Duration::from_millis(1));
        assert_eq!(frame.commands_processed, 2);
        assert_eq!(frame.commands_failed, 1);

        // Next frame starts from zero.
        let next = telemetry.end_frame();
        assert_eq!(next, FrameTimings::default());
    }

    #[test]
    fn gpu_and_main_wait_tracked() {
        let telemetry = Telemetry::new();
        telemetry.add_gpu_time(Duration::from_micros(500));
        telemetry.add_wait_for_main(Duration::from_micros(250));

        let frame = telemetry.end_frame();
        assert_eq!(frame.gpu_time, Duration::from_micros(500));
        assert_eq!(frame.wait_for_main, Duration::from_micros(250));
    }
}
