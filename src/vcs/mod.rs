//! Version control boundary
//!
//! `VersionControl` is the capability the sync engine needs from the
//! version-control system: resolving revisions, listing changed paths,
//! and reading content and diffs. `GitCli` implements it by shelling out
//! to `git`; `RevisionOracle` layers source filtering on top.

mod git;
mod oracle;

pub use git::GitCli;
pub use oracle::{DiffPaths, RevisionOracle, SourceFilter};

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{Result, RevisionId, SourcePath};

/// How a path changed between two revisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Added,
    Modified,
    Deleted,
}

/// One raw entry of a revision-to-revision diff, unfiltered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathChange {
    pub path: String,
    pub status: ChangeStatus,
}

/// Version-control capability
///
/// Any failure of the underlying system is an error. Content that does not
/// exist at a revision is `Ok(None)`, never an error.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Resolve a symbolic revision (`HEAD`, a branch, a short hash) to a full id
    async fn resolve(&self, rev: &str) -> Result<RevisionId>;

    /// Paths added, modified, or deleted between two revisions
    async fn changed_paths(&self, from: &RevisionId, to: &RevisionId) -> Result<Vec<PathChange>>;

    /// Textual diff of one path; empty when there is nothing comparable
    async fn diff(&self, path: &SourcePath, from: &RevisionId, to: &RevisionId)
    -> Result<String>;

    /// Content of a path at a revision
    async fn show(&self, path: &SourcePath, rev: &RevisionId) -> Result<Option<String>>;

    /// Most recent revision at or before `rev` that touched `path`
    async fn last_touching(&self, path: &SourcePath, rev: &RevisionId)
    -> Result<Option<RevisionId>>;

    /// Whether `ancestor` is reachable from `descendant` (a revision is its own ancestor)
    async fn is_ancestor(&self, ancestor: &RevisionId, descendant: &RevisionId) -> Result<bool>;

    /// Every tracked path at a revision
    async fn list_files(&self, rev: &RevisionId) -> Result<Vec<String>>;
}

pub type SharedVcs = Arc<dyn VersionControl>;
