//! Module bookkeeping
//!
//! - `graph`: module records and narrative documents
//! - `assignment`: the global assignment index and confidence gating
//! - `narrative`: front-matter grammar for narrative documents

pub mod assignment;
pub mod graph;
pub mod narrative;
mod types;

pub use assignment::{
    AssignmentIndex, AssignmentRecord, Recommendation, partition_by_confidence,
};
pub use graph::ModuleGraph;
pub use narrative::{Narrative, NarrativeError, Section};
pub use types::{DocumentedFile, Module, ModuleStats, validate_slug};
