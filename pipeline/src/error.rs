//! Pipeline error types.

use std::fmt;
use std::sync::Arc;

use crate::guard::ThreadRole;

/// Errors that can occur in the render-command pipeline.
///
/// Protocol violations and allocation failures are fatal: they indicate an
/// upstream programming defect or an unrecoverable resource condition, and
/// are routed through the pipeline's [`FatalHandler`]. Command failures
/// reaching this type are the fatal class that stops the worker; per-command
/// recoverable failures are logged and counted in telemetry instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A producer-only operation was invoked from a non-producer thread.
    ProtocolViolation {
        /// The role the operation requires.
        role: ThreadRole,
        /// Description of the violating thread.
        thread: String,
    },
    /// A command buffer could not grow to hold an enqueued command.
    AllocationFailed {
        /// Total capacity in bytes the buffer needed.
        requested: usize,
        /// Index of the ring slot being filled.
        slot: usize,
    },
    /// A command's execution failed with a fatal flag.
    CommandFailed {
        /// Command type identifier of the failing command.
        kind: u32,
        /// Failure description reported by the executor.
        message: String,
    },
    /// The GPU device was lost while executing a command.
    DeviceLost,
    /// The consumer worker has already stopped.
    WorkerStopped,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtocolViolation { role, thread } => {
                write!(
                    f,
                    "protocol violation: {role:?}-only operation called from thread {thread}"
                )
            }
            Self::AllocationFailed { requested, slot } => {
                write!(
                    f,
                    "command buffer allocation failed: {requested} bytes requested for slot {slot}"
                )
            }
            Self::CommandFailed { kind, message } => {
                write!(f, "command {kind:#010x} failed fatally: {message}")
            }
            Self::DeviceLost => write!(f, "GPU device lost"),
            Self::WorkerStopped => write!(f, "render worker already stopped"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Error returned by a [`CommandExecutor`](crate::worker::CommandExecutor)
/// for a single command.
///
/// `Failed` is recoverable: the worker logs it and continues with the next
/// command. `Fatal` and `DeviceLost` stop the worker and surface on the
/// pipeline's fatal-error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Recoverable failure; processing continues.
    Failed(String),
    /// Unrecoverable failure; the worker stops.
    Fatal(String),
    /// The GPU device was lost; the worker stops.
    DeviceLost,
}

impl CommandError {
    /// Whether this failure stops the worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::DeviceLost)
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(msg) => write!(f, "command failed: {msg}"),
            Self::Fatal(msg) => write!(f, "fatal command failure: {msg}"),
            Self::DeviceLost => write!(f, "GPU device lost"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Handler invoked for fatal pipeline errors.
///
/// The default handler logs the diagnostic and panics, terminating the
/// process. Tests install a recording handler instead; when the handler
/// returns, the offending operation is abandoned.
pub type FatalHandler = Arc<dyn Fn(&PipelineError) + Send + Sync>;

/// The production fatal handler: log and panic with the diagnostic.
pub fn default_fatal_handler() -> FatalHandler {
    Arc::new(|error| {
        log::error!("fatal pipeline error: {error}");
        panic!("fatal pipeline error: {error}");
    })
}
