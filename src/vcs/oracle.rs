//! Revision oracle
//!
//! Source-aware view of version control: every path it returns is
//! normalized and filtered to the configured roots, the extension
//! allowlist, and the test-path exclusions.

use std::collections::BTreeSet;
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use tracing::{debug, instrument, warn};

use super::{ChangeStatus, SharedVcs};
use crate::config::SourcesConfig;
use crate::types::{Result, RevisionId, SourcePath, SyncError};

// =============================================================================
// Source Filter
// =============================================================================

/// Decides whether a repository path is a documentable source file
#[derive(Debug, Clone)]
pub struct SourceFilter {
    roots: Vec<String>,
    extensions: Vec<String>,
    exclude: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl SourceFilter {
    pub fn new(config: &SourcesConfig) -> Result<Self> {
        let exclude = config
            .exclude
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|e| {
                    SyncError::Config(format!("invalid exclude pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            roots: config
                .roots
                .iter()
                .map(|r| r.trim_matches('/').to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            exclude,
        })
    }

    pub fn matches(&self, path: &SourcePath) -> bool {
        let p = path.as_str();

        let in_root = self.roots.is_empty()
            || self
                .roots
                .iter()
                .any(|root| p.strip_prefix(root.as_str()).is_some_and(|rest| rest.starts_with('/')));
        if !in_root {
            return false;
        }

        let allowed = path
            .extension()
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if !allowed {
            return false;
        }

        !self
            .exclude
            .iter()
            .any(|pattern| pattern.matches_with(p, MATCH_OPTIONS))
    }

    /// Normalize a raw path and keep it only if it is a source file
    pub fn accept(&self, raw: &str) -> Option<SourcePath> {
        match SourcePath::new(raw) {
            Ok(path) if self.matches(&path) => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!("Ignoring path from version control: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// Revision Oracle
// =============================================================================

/// Filtered change lists between two revisions, each sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPaths {
    pub changed: Vec<SourcePath>,
    pub added: Vec<SourcePath>,
    pub deleted: Vec<SourcePath>,
}

impl DiffPaths {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }
}

#[derive(Clone)]
pub struct RevisionOracle {
    vcs: SharedVcs,
    filter: Arc<SourceFilter>,
}

impl RevisionOracle {
    pub fn new(vcs: SharedVcs, filter: SourceFilter) -> Self {
        Self {
            vcs,
            filter: Arc::new(filter),
        }
    }

    pub fn filter(&self) -> &SourceFilter {
        &self.filter
    }

    pub async fn resolve_head(&self) -> Result<RevisionId> {
        self.vcs.resolve("HEAD").await
    }

    pub async fn resolve(&self, rev: &str) -> Result<RevisionId> {
        self.vcs.resolve(rev).await
    }

    #[instrument(skip(self), fields(from = %from.short(), to = %to.short()))]
    pub async fn diff_paths(&self, from: &RevisionId, to: &RevisionId) -> Result<DiffPaths> {
        let mut changed = BTreeSet::new();
        let mut added = BTreeSet::new();
        let mut deleted = BTreeSet::new();

        for change in self.vcs.changed_paths(from, to).await? {
            let Some(path) = self.filter.accept(&change.path) else {
                continue;
            };
            match change.status {
                ChangeStatus::Added => added.insert(path),
                ChangeStatus::Modified => changed.insert(path),
                ChangeStatus::Deleted => deleted.insert(path),
            };
        }

        let diff = DiffPaths {
            changed: changed.into_iter().collect(),
            added: added.into_iter().collect(),
            deleted: deleted.into_iter().collect(),
        };
        debug!(
            changed = diff.changed.len(),
            added = diff.added.len(),
            deleted = diff.deleted.len(),
            "Diffed revisions"
        );
        Ok(diff)
    }

    /// Textual diff for one path. Empty means "not comparable, treat as new".
    pub async fn file_diff(
        &self,
        path: &SourcePath,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<String> {
        self.vcs.diff(path, from, to).await
    }

    pub async fn content_at(&self, path: &SourcePath, rev: &RevisionId) -> Result<Option<String>> {
        self.vcs.show(path, rev).await
    }

    pub async fn last_revision_touching(
        &self,
        path: &SourcePath,
        at: &RevisionId,
    ) -> Result<Option<RevisionId>> {
        self.vcs.last_touching(path, at).await
    }

    pub async fn is_ancestor(&self, ancestor: &RevisionId, descendant: &RevisionId) -> Result<bool> {
        self.vcs.is_ancestor(ancestor, descendant).await
    }

    /// Every source file tracked at `rev`, filtered and sorted
    pub async fn source_files(&self, rev: &RevisionId) -> Result<Vec<SourcePath>> {
        let files: BTreeSet<SourcePath> = self
            .vcs
            .list_files(rev)
            .await?
            .iter()
            .filter_map(|raw| self.filter.accept(raw))
            .collect();
        Ok(files.into_iter().collect())
    }
}
