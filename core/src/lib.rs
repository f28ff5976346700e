//! # Vermilion Engine Core
//!
//! Core crate for Vermilion Engine basic utilities: profiling macros,
//! owned worker threads, and blocking signal events.

pub mod event;
pub mod profiling;
pub mod thread;

pub use event::SignalEvent;
pub use thread::OwnedThread;

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
