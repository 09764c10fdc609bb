//! docsync - Incremental Documentation Sync
//!
//! Keeps three tiers of per-file documentation and per-module narrative
//! documents in step with a version-controlled source tree. Each run diffs
//! the last synced revision against HEAD, regenerates or updates only the
//! affected artifacts through an LLM-backed generator, and records what
//! revision every artifact reflects.
//!
//! ## Quick Start
//!
//! ```ignore
//! use docsync::{ConfigLoader, SyncOrchestrator};
//!
//! let config = Arc::new(ConfigLoader::load(&root)?);
//! let sync = SyncOrchestrator::open(config, files, vcs, generator).await?;
//! let report = sync.sync().await?;
//! ```
//!
//! ## Modules
//!
//! - [`vcs`]: revision resolution, diffs and content retrieval over git
//! - [`storage`]: tier artifacts, the sync log, file stores
//! - [`modules`]: module records, narratives and the assignment index
//! - [`ai`]: LLM providers and the `Generator` capability
//! - [`sync`]: change classification and the phased sync run

pub mod ai;
pub mod cli;
pub mod config;
pub mod constants;
pub mod modules;
pub mod storage;
pub mod sync;
pub mod types;
pub mod vcs;

#[cfg(test)]
pub mod testing;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ErrorCategory, ErrorKind, IntegrityError, LlmError, Result, SyncError};
pub use types::{RevisionId, SourcePath, Tier};

// =============================================================================
// Sync Re-exports
// =============================================================================

pub use sync::{ChangeClassifier, ChangeSet, SyncOrchestrator, SyncReport, SyncStatus, UnitOutcome};

// =============================================================================
// Storage Re-exports
// =============================================================================

pub use modules::{AssignmentIndex, Module, ModuleGraph};
pub use storage::{FileStore, LocalFileStore, SyncLog, TierStore};

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    ClaudeCodeProvider, Generator, LlmGenerator, LlmProvider, LlmResponse, OpenAiProvider,
    TimeoutConfig, with_timeout,
};
