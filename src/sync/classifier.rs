//! Change classification
//!
//! Turns a revision pair (or an explicit path set) into the work of one
//! sync run. Diff membership alone is not enough: a path is only new or
//! changed when the sync log says its artifacts are stale.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::modules::{AssignmentIndex, ModuleGraph};
use crate::storage::SyncLog;
use crate::types::{Result, RevisionId, SourcePath};
use crate::vcs::RevisionOracle;

/// Work for one sync run, each list sorted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// No usable documentation yet
    pub new: Vec<SourcePath>,
    /// Documented at an older revision
    pub changed: Vec<SourcePath>,
    pub deleted: Vec<SourcePath>,
    /// In the diff but already synced
    pub skipped: Vec<SourcePath>,
    /// Owners of any new, changed or deleted path
    pub affected_modules: Vec<String>,
}

impl ChangeSet {
    /// Nothing to write
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    pub fn unit_count(&self) -> usize {
        self.new.len() + self.changed.len() + self.deleted.len()
    }
}

/// Accumulates classified paths, keeping each in exactly one bucket
#[derive(Default)]
struct Buckets {
    new: BTreeSet<SourcePath>,
    changed: BTreeSet<SourcePath>,
    deleted: BTreeSet<SourcePath>,
    skipped: BTreeSet<SourcePath>,
}

pub struct ChangeClassifier {
    oracle: RevisionOracle,
    sync_log: Arc<SyncLog>,
    graph: Arc<ModuleGraph>,
    assignments: Arc<AssignmentIndex>,
}

impl ChangeClassifier {
    pub fn new(
        oracle: RevisionOracle,
        sync_log: Arc<SyncLog>,
        graph: Arc<ModuleGraph>,
        assignments: Arc<AssignmentIndex>,
    ) -> Self {
        Self {
            oracle,
            sync_log,
            graph,
            assignments,
        }
    }

    /// Classify the diff between `from` and `to`; no `from` means bootstrap
    #[instrument(skip(self), fields(to = %to.short()))]
    pub async fn classify(&self, from: Option<&RevisionId>, to: &RevisionId) -> Result<ChangeSet> {
        let Some(from) = from else {
            return self.bootstrap(to).await;
        };

        let diff = self.oracle.diff_paths(from, to).await?;
        let excluded = self.assignments.excluded().await;
        let mut buckets = Buckets::default();

        for path in diff.added.iter().chain(diff.changed.iter()) {
            if excluded.contains(path) {
                debug!(path = %path, "Excluded from documentation, ignoring");
                continue;
            }
            self.place_present(path, to, &mut buckets).await?;
        }
        buckets.deleted.extend(diff.deleted.iter().cloned());

        self.finish(buckets).await
    }

    /// Every tracked source file at `to` is a candidate; log entries for
    /// files no longer present are deletions
    #[instrument(skip(self), fields(to = %to.short()))]
    pub async fn bootstrap(&self, to: &RevisionId) -> Result<ChangeSet> {
        let present = self.oracle.source_files(to).await?;
        let excluded = self.assignments.excluded().await;
        let mut buckets = Buckets::default();

        for path in &present {
            if excluded.contains(path) {
                continue;
            }
            self.place_present(path, to, &mut buckets).await?;
        }

        let present: BTreeSet<&SourcePath> = present.iter().collect();
        for tracked in self.sync_log.paths().await {
            if !present.contains(&tracked) {
                buckets.deleted.insert(tracked);
            }
        }

        info!(files = present.len(), "Bootstrap classification");
        self.finish(buckets).await
    }

    /// Classify caller-supplied paths against `head`
    #[instrument(skip(self, paths), fields(head = %head.short(), paths = paths.len()))]
    pub async fn classify_files(&self, paths: &[SourcePath], head: &RevisionId) -> Result<ChangeSet> {
        let excluded = self.assignments.excluded().await;
        let mut buckets = Buckets::default();

        for path in paths {
            if !self.oracle.filter().matches(path) {
                warn!(path = %path, "Not a source file under the configured roots, ignoring");
                continue;
            }
            if excluded.contains(path) {
                warn!(path = %path, "Excluded from documentation, ignoring");
                continue;
            }
            if self.oracle.content_at(path, head).await?.is_none() {
                if self.sync_log.get(path).await.is_some() {
                    buckets.deleted.insert(path.clone());
                } else {
                    warn!(path = %path, "Not present at HEAD and never synced, ignoring");
                }
                continue;
            }
            self.place_present(path, head, &mut buckets).await?;
        }

        self.finish(buckets).await
    }

    async fn place_present(
        &self,
        path: &SourcePath,
        at: &RevisionId,
        buckets: &mut Buckets,
    ) -> Result<()> {
        if self.sync_log.get(path).await.is_none() {
            buckets.new.insert(path.clone());
        } else if self.sync_log.needs_sync(path, at, &self.oracle).await? {
            buckets.changed.insert(path.clone());
        } else {
            debug!(path = %path, "Already synced");
            buckets.skipped.insert(path.clone());
        }
        Ok(())
    }

    async fn finish(&self, buckets: Buckets) -> Result<ChangeSet> {
        let owners: BTreeMap<SourcePath, String> = self
            .graph
            .all_modules()
            .await?
            .into_iter()
            .rev()
            .flat_map(|m| {
                let slug = m.slug.clone();
                m.all_paths().into_iter().map(move |p| (p, slug.clone()))
            })
            .collect();

        let affected: BTreeSet<String> = buckets
            .new
            .iter()
            .chain(buckets.changed.iter())
            .chain(buckets.deleted.iter())
            .filter_map(|p| owners.get(p).cloned())
            .collect();

        let set = ChangeSet {
            new: buckets.new.into_iter().collect(),
            changed: buckets.changed.into_iter().collect(),
            deleted: buckets.deleted.into_iter().collect(),
            skipped: buckets.skipped.into_iter().collect(),
            affected_modules: affected.into_iter().collect(),
        };
        info!(
            units = set.unit_count(),
            new = set.new.len(),
            changed = set.changed.len(),
            deleted = set.deleted.len(),
            skipped = set.skipped.len(),
            modules = set.affected_modules.len(),
            "Classified changes"
        );
        Ok(set)
    }
}
