//! Cryo Core - batch processing of cryo-ET tilt series.
//!
//! This crate contains the orchestration logic with zero terminal UI
//! dependencies. It reads Warp/SerialEM sidecar metadata, schedules
//! external tools (ccderaser, AreTomo, newstack, topaz) over a GPU-bounded
//! worker pool and reports per-job outcomes.

pub mod config;
pub mod gpu;
pub mod logging;
pub mod metadata;
pub mod orchestrator;
pub mod runner;
pub mod tools;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
