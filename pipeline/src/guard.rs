//! Thread role registration and producer validation.
//!
//! The pipeline assumes exactly one producer. [`ThreadRoleTable`] records
//! which OS thread holds each logical role, and
//! [`ThreadRoleTable::validate_producer`] detects enqueues from any other
//! thread immediately, rather than letting interleaved writes surface
//! later as rare render corruption.

use std::thread::ThreadId;

use parking_lot::Mutex;

/// Logical thread roles participating in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadRole {
    /// The simulation/game-logic thread; the only permitted producer.
    Main,
    /// The primary render worker.
    Render,
    /// The secondary worker serving the loading overlay.
    RenderLoading,
}

impl ThreadRole {
    /// Human-readable thread label, used for thread naming and profiling.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Main => "vermilion: main",
            Self::Render => "vermilion: render",
            Self::RenderLoading => "vermilion: render loading",
        }
    }

    fn index(&self) -> usize {
        match self {
            Self::Main => 0,
            Self::Render => 1,
            Self::RenderLoading => 2,
        }
    }
}

/// Map from logical role to OS thread identity.
///
/// Roles are registered once per worker at startup (the loading role is
/// re-registered on each activation). Reads happen on every enqueue, but
/// the table changes only at startup and mode switches, so a single
/// lightweight mutex suffices.
#[derive(Debug, Default)]
pub struct ThreadRoleTable {
    roles: Mutex<[Option<ThreadId>; 3]>,
    relaxed: Mutex<usize>,
}

impl ThreadRoleTable {
    /// Create an empty table with the relaxed window closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the calling thread as holding `role`.
    pub fn register(&self, role: ThreadRole) {
        let id = std::thread::current().id();
        let mut roles = self.roles.lock();
        if let Some(previous) = roles[role.index()] {
            if previous != id {
                log::debug!("re-registering {role:?} from {previous:?} to {id:?}");
            }
        }
        roles[role.index()] = Some(id);
    }

    /// The thread registered for `role`, if any.
    pub fn registered(&self, role: ThreadRole) -> Option<ThreadId> {
        self.roles.lock()[role.index()]
    }

    /// Open the relaxed-access window.
    ///
    /// While the window is open, [`validate_producer`](Self::validate_producer)
    /// accepts any thread. This is an intentional allowance for the narrow
    /// bootstrap and level-load phases, where loading code enqueues before
    /// the steady-state single-producer discipline is in force. Windows
    /// nest; each `begin_relaxed` needs a matching `end_relaxed`.
    pub fn begin_relaxed(&self) {
        *self.relaxed.lock() += 1;
    }

    /// Close one level of the relaxed-access window.
    pub fn end_relaxed(&self) {
        let mut depth = self.relaxed.lock();
        *depth = depth.saturating_sub(1);
    }

    /// Whether the relaxed-access window is currently open.
    pub fn is_relaxed(&self) -> bool {
        *self.relaxed.lock() > 0
    }

    /// Check that the calling thread is the registered producer.
    ///
    /// Passes before the Main role is registered (bootstrap) and while the
    /// relaxed window is open. Any other mismatch is a protocol violation;
    /// the pipeline routes it to the fatal path.
    pub fn validate_producer(&self) -> Result<(), crate::error::PipelineError> {
        if self.is_relaxed() {
            return Ok(());
        }
        let registered = self.roles.lock()[ThreadRole::Main.index()];
        match registered {
            // Bootstrap: nothing registered yet.
            None => Ok(()),
            Some(main) if main == std::thread::current().id() => Ok(()),
            Some(_) => {
                let current = std::thread::current();
                let thread = match current.name() {
                    Some(name) => format!("{:?} ({name})", current.id()),
                    None => format!("{:?}", current.id()),
                };
                Err(crate::error::PipelineError::ProtocolViolation {
                    role: ThreadRole::Main,
                    thread,
                })
            }
        }
    }
}
