//! Loading-overlay mode and its secondary worker.
//!
//! During level-start asset streaming the main thread is busy loading, yet
//! a loading/video overlay still has to render. [`ModeController`] starts
//! an independent secondary worker for that overlay, with its own ring and
//! thread role, running concurrently with (and independently of) the
//! primary pipeline — which need not even be fully initialized yet.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{LoadingPolicy, PipelineConfig};
use crate::error::PipelineError;
use crate::flush::FlushBarrier;
use crate::guard::{ThreadRole, ThreadRoleTable};
use crate::ring::CommandRing;
use crate::telemetry::Telemetry;
use crate::worker::{CommandExecutor, Worker};

/// Loading-overlay mode state.
///
/// Transitions: `Disabled -> Active` on [`ModeController::switch`]`(true)`
/// when preconditions hold; `Active -> StoppingActive -> Disabled` on
/// `switch(false)`, completing only after the worker drains its last slot
/// and joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeState {
    /// No loading worker; normal rendering only.
    Disabled,
    /// The loading worker is consuming overlay commands.
    Active,
    /// Graceful drain requested; worker finishing and joining.
    StoppingActive,
}

/// Factory creating an executor for each loading-worker activation.
pub type LoadingExecutorFactory = Box<dyn Fn() -> Box<dyn CommandExecutor + Send> + Send + Sync>;

struct ActiveLoading {
    ring: Arc<CommandRing>,
    barrier: Arc<FlushBarrier>,
    worker: Worker,
}

struct ControllerInner {
    state: ModeState,
    active: Option<ActiveLoading>,
}

/// Governs the loading worker's lifecycle.
pub(crate) struct ModeController {
    inner: Mutex<ControllerInner>,
    factory: Mutex<Option<LoadingExecutorFactory>>,
    policy: LoadingPolicy,
    slot_capacity: usize,
    max_slot_capacity: Option<usize>,
    roles: Arc<ThreadRoleTable>,
    telemetry: Arc<Telemetry>,
}

impl ModeController {
    pub fn new(
        config: &PipelineConfig,
        roles: Arc<ThreadRoleTable>,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        Self {
            inner: Mutex::new(ControllerInner {
                state: ModeState::Disabled,
                active: None,
            }),
            factory: Mutex::new(None),
            policy: config.loading.clone(),
            slot_capacity: config.initial_slot_capacity,
            max_slot_capacity: config.max_slot_capacity,
            roles,
            telemetry,
        }
    }

    pub fn set_factory(&self, factory: LoadingExecutorFactory) {
        *self.factory.lock() = Some(factory);
    }

    pub fn mode(&self) -> ModeState {
        self.inner.lock().state
    }

    /// Toggle loading mode. Redundant switches are no-ops.
    pub fn switch(&self, enable: bool) {
        if enable {
            self.switch_on();
        } else {
            self.switch_off();
        }
    }

    fn switch_on(&self) {
        let mut inner = self.inner.lock();
        if inner.state != ModeState::Disabled {
            log::debug!("loading mode already active; ignoring switch");
            return;
        }
        if !self.policy.permits_loading_worker() {
            log::info!("loading worker preconditions unmet; staying single-threaded");
            return;
        }
        let executor = match self.factory.lock().as_ref() {
            Some(factory) => factory(),
            None => {
                log::warn!("no loading executor configured; loading mode unavailable");
                return;
            }
        };

        // The loading worker owns its own slots, independent of the
        // primary ring.
        let ring = Arc::new(CommandRing::new(2, self.slot_capacity, self.max_slot_capacity));
        let barrier = Arc::new(FlushBarrier::new());
        let worker = match Worker::spawn(
            ThreadRole::RenderLoading,
            ring.clone(),
            barrier.clone(),
            self.telemetry.clone(),
            self.roles.clone(),
            executor,
        ) {
            Ok(worker) => worker,
            Err(error) => {
                log::warn!("failed to spawn loading worker: {error}");
                return;
            }
        };
        worker.wait_started();

        // Level-load window: loading code may enqueue from threads other
        // than the steady-state producer.
        self.roles.begin_relaxed();
        inner.state = ModeState::Active;
        inner.active = Some(ActiveLoading {
            ring,
            barrier,
            worker,
        });
        log::info!("loading overlay mode active");
    }

    fn switch_off(&self) {
        let active = {
            let mut inner = self.inner.lock();
            if inner.state != ModeState::Active {
                log::debug!("loading mode already disabled; ignoring switch");
                return;
            }
            inner.state = ModeState::StoppingActive;
            inner.active.take()
        };

        if let Some(active) = active {
            // Publish whatever is still in the fill slot, then wait for the
            // worker to drain every published slot. No orphaned work.
            active.ring.advance(&active.barrier, &self.telemetry);
            active.barrier.wait_drained();
            active.worker.join();
        }

        self.roles.end_relaxed();
        self.inner.lock().state = ModeState::Disabled;
        log::info!("loading overlay mode disabled");
    }

    /// Enqueue an overlay command for the loading worker.
    pub fn enqueue(&self, kind: u32, payload: &[u8]) -> Result<(), PipelineError> {
        let ring = {
            let inner = self.inner.lock();
            match &inner.active {
                Some(active) if inner.state == ModeState::Active => active.ring.clone(),
                _ => {
                    log::warn!("loading enqueue while mode is not active; command dropped");
                    return Ok(());
                }
            }
        };
        ring.enqueue(kind, payload)
    }

    /// Publish the loading ring's fill slot.
    pub fn advance(&self) {
        let active = {
            let inner = self.inner.lock();
            match &inner.active {
                Some(active) if inner.state == ModeState::Active => {
                    (active.ring.clone(), active.barrier.clone())
                }
                _ => return,
            }
        };
        active.0.advance(&active.1, &self.telemetry);
    }

    /// Stop and join the loading worker if one is running.
    pub fn shutdown(&self) {
        self.switch_off();
    }
}
