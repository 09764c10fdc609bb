//! Incremental documentation sync
//!
//! - `classifier`: revision diff to new/changed/deleted work
//! - `orchestrator`: the phased run over that work
//! - `unit`: retry and deadline policy for one unit
//! - `locks`: per-path and per-module exclusion
//! - `report`: run and status summaries

pub mod classifier;
pub mod locks;
pub mod orchestrator;
pub mod report;
pub mod unit;

pub use classifier::{ChangeClassifier, ChangeSet};
pub use locks::PathLocks;
pub use orchestrator::SyncOrchestrator;
pub use report::{AssignmentOutcome, SyncReport, SyncStatus, UnitCounts, UnitReport};
pub use unit::{UnitOutcome, UnitRunner};
