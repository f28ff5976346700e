//! Pipeline configuration.

/// Configuration for a render-command pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Number of ring slots. 2 gives strict double buffering (the
    /// default); larger values trade memory and latency for producer
    /// headroom. Values below 2 are clamped with a warning.
    pub ring_slots: usize,
    /// Initial byte capacity of each slot's command buffer, sized so
    /// steady-state frames do not reallocate.
    pub initial_slot_capacity: usize,
    /// Hard cap on a slot buffer's growth. Writes past the cap take the
    /// fatal allocation-failure path. `None` leaves growth bounded only
    /// by the allocator.
    pub max_slot_capacity: Option<usize>,
    /// Preconditions gating the loading-overlay worker.
    pub loading: LoadingPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ring_slots: 2,
            initial_slot_capacity: 64 * 1024,
            max_slot_capacity: None,
            loading: LoadingPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Ring slot count with the minimum of 2 enforced.
    pub(crate) fn effective_ring_slots(&self) -> usize {
        if self.ring_slots < 2 {
            log::warn!(
                "ring_slots = {} is below the minimum; clamping to 2",
                self.ring_slots
            );
            2
        } else {
            self.ring_slots
        }
    }
}

/// Preconditions for starting the loading-overlay worker.
///
/// These are platform and embedder policy, not hardwired constants: a
/// headless test run or an editor session keeps the overlay disabled, and
/// single-core machines gain nothing from a second render thread.
#[derive(Debug, Clone)]
pub struct LoadingPolicy {
    /// Minimum number of available cores required.
    pub min_cores: usize,
    /// The embedder runs without a display (tests, servers).
    pub headless: bool,
    /// The embedder is an editor session.
    pub editor: bool,
}

impl Default for LoadingPolicy {
    fn default() -> Self {
        Self {
            min_cores: 2,
            headless: false,
            editor: false,
        }
    }
}

impl LoadingPolicy {
    /// Whether the loading worker may start under this policy.
    ///
    /// Core count is measured via `std::thread::available_parallelism`.
    pub fn permits_loading_worker(&self) -> bool {
        if self.headless || self.editor {
            return false;
        }
        let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
        cores >= self.min_cores
    }
}
