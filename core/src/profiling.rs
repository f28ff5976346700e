//! Profiling support via Tracy.
//!
//! Optional instrumentation for the render pipeline using the
//! [Tracy profiler](https://github.com/wolfpld/tracy), enabled via the
//! `profiling` Cargo feature.
//!
//! The render pipeline marks frame boundaries with [`frame_mark!`], labels
//! its worker threads with [`set_thread_name!`], and plots per-frame wait
//! and processing times with [`profile_plot!`].
//!
//! # Enabling Profiling
//!
//! ```toml
//! [dependencies]
//! vermilion-core = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! When profiling is disabled (the default), all macros compile to no-ops
//! with zero runtime overhead.

// Re-export tracy-client types when profiling is enabled
#[cfg(feature = "profiling")]
pub use tracy_client::{
    self, Client, Span, frame_mark as tracy_frame_mark, plot as tracy_plot, span,
};

/// Mark the end of a frame for Tracy's frame analysis.
///
/// The producer calls this once per simulated frame, at the frame boundary
/// where the command ring rotates.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! frame_mark {
    () => {
        $crate::profiling::tracy_frame_mark()
    };
}

/// Mark the end of a frame (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! frame_mark {
    () => {};
}

/// Create a profiling span for the current scope.
///
/// The span automatically ends when the scope exits.
///
/// # Example
///
/// ```ignore
/// {
///     profile_scope!("pipeline: process slot");
///     // ... execute the slot's commands ...
/// }
/// ```
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Plot a value over time in Tracy.
///
/// Used for per-frame metrics such as producer wait time or processed
/// command counts.
///
/// # Example
///
/// ```ignore
/// profile_plot!("pipeline: wait for render (ms)", wait_ms);
/// ```
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        $crate::profiling::tracy_plot!($name, $value as f64)
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:expr, $value:expr) => {
        let _ = $value; // Avoid unused warnings
    };
}

/// Set the name of the current thread for Tracy.
///
/// Worker threads call this on startup so the main, render, and loading
/// threads are identifiable in the profiler and in crash dumps.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! set_thread_name {
    ($name:expr) => {
        $crate::profiling::tracy_client::set_thread_name!($name)
    };
}

/// Set thread name (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! set_thread_name {
    ($name:expr) => {};
}

// Re-export macros at module level
pub use frame_mark;
pub use profile_plot;
pub use profile_scope;
pub use set_thread_name;
