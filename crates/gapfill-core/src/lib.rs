//! gapfill-core: Core library for gapfill
//!
//! Detects gaps in regularly sampled sensor logs kept in a spreadsheet and
//! fills them with interpolated rows, one paced write at a time.
//!
//! # Architecture
//!
//! ```text
//! TabularStore ─→ Sequence ─→ Baseline ─→ Gap Detector ─→ RepairPlan
//!      ↑                                                      │
//!      └──────── WriteScheduler (paced, refresh per gap) ←────┘
//!                        ↑
//!          RunDriver (plan → confirm → execute)
//! ```
//!
//! # Modules
//!
//! - `store`: tabular store trait with Sheets, file and in-memory backends
//! - `sequence`: owned snapshot of the log and its projection after a repair
//! - `timestamp`: parsing, store-native encoding and delta arithmetic
//! - `columns`: column layout and A1 notation
//! - `baseline`: rolling expected delta
//! - `detector`: gap decision
//! - `interpolate`: synthetic rows and write operations for one gap
//! - `engine`: per-cursor decision shared by planner and run
//! - `planner`: dry-run estimation
//! - `scheduler`: rate-limited write execution
//! - `driver`: end-to-end run orchestration
//! - `config`: configuration management
//! - `logging`: tracing setup
//!
//! # Safety
//!
//! This crate forbids unsafe code.

#![forbid(unsafe_code)]

pub mod baseline;
pub mod columns;
pub mod config;
pub mod detector;
pub mod driver;
pub mod engine;
pub mod error;
pub mod interpolate;
pub mod logging;
pub mod planner;
pub mod scheduler;
pub mod sequence;
pub mod store;
pub mod timestamp;

pub use error::{Error, Result};

/// Version of the gapfill-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
