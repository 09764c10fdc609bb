//! Sync run report

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::classifier::ChangeClassifier;
use super::unit::UnitOutcome;
use crate::modules::{AssignmentIndex, ModuleGraph};
use crate::storage::SyncLog;
use crate::types::{Result, RevisionId, SourcePath};
use crate::vcs::RevisionOracle;

/// Outcome counts for one kind of unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnitCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub requeued: usize,
    pub failed: usize,
}

impl UnitCounts {
    fn record(&mut self, outcome: &UnitOutcome) {
        match outcome {
            UnitOutcome::Succeeded => self.succeeded += 1,
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::Requeued(_) => self.requeued += 1,
            UnitOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.requeued + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.requeued == 0 && self.failed == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentOutcome {
    /// Unassigned files offered to the generator
    pub analyzed: usize,
    pub applied: usize,
    pub low_confidence: usize,
    /// Applied-confidence recommendations refused by the module graph
    pub rejected: usize,
    /// The suggestion request itself failed
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub item: String,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub from: Option<RevisionId>,
    pub to: RevisionId,
    pub files: UnitCounts,
    pub modules: UnitCounts,
    /// Deleted source files whose artifacts were removed
    pub deleted: usize,
    pub assignment: AssignmentOutcome,
    /// The baseline revision moved to `to`
    pub advanced: bool,
    /// Every unit that did not succeed or skip
    pub problems: Vec<UnitReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn new(run_id: Uuid, from: Option<RevisionId>, to: RevisionId) -> Self {
        Self {
            run_id,
            from,
            to,
            files: UnitCounts::default(),
            modules: UnitCounts::default(),
            deleted: 0,
            assignment: AssignmentOutcome::default(),
            advanced: false,
            problems: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_file(&mut self, item: impl Into<String>, outcome: UnitOutcome) {
        self.files.record(&outcome);
        self.note(item.into(), outcome);
    }

    pub fn record_module(&mut self, slug: impl Into<String>, outcome: UnitOutcome) {
        self.modules.record(&outcome);
        self.note(slug.into(), outcome);
    }

    fn note(&mut self, item: String, outcome: UnitOutcome) {
        if outcome.is_pending() {
            self.problems.push(UnitReport { item, outcome });
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Every unit succeeded or was skipped
    pub fn is_complete(&self) -> bool {
        self.files.is_clean() && self.modules.is_clean() && !self.assignment.failed
    }

    /// Nothing was written
    pub fn is_noop(&self) -> bool {
        self.files.succeeded == 0 && self.modules.succeeded == 0 && self.deleted == 0 && !self.advanced
    }
}

/// Pending work as seen from the current baseline
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub baseline: Option<RevisionId>,
    pub head: RevisionId,
    pub tracked_files: usize,
    pub pending_new: Vec<SourcePath>,
    pub pending_changed: Vec<SourcePath>,
    pub pending_deleted: Vec<SourcePath>,
    pub modules: usize,
    /// Modules with undocumented files that already have tiers
    pub stale_modules: Vec<String>,
    pub unassigned: usize,
    pub excluded: usize,
    pub low_confidence: usize,
    pub last_analysis: Option<DateTime<Utc>>,
}

impl SyncStatus {
    /// Read-only snapshot of the stores against HEAD
    pub async fn collect(
        oracle: &RevisionOracle,
        classifier: &ChangeClassifier,
        sync_log: &SyncLog,
        graph: &ModuleGraph,
        assignments: &AssignmentIndex,
    ) -> Result<Self> {
        let head = oracle.resolve_head().await?;
        let baseline = sync_log.baseline().await;
        let pending = classifier.classify(baseline.as_ref(), &head).await?;
        let modules = graph.all_slugs().await?.len();
        let stale_modules = graph.modules_needing_regeneration().await?;
        let record = assignments.snapshot().await;

        Ok(Self {
            baseline,
            head,
            tracked_files: sync_log.paths().await.len(),
            pending_new: pending.new,
            pending_changed: pending.changed,
            pending_deleted: pending.deleted,
            modules,
            stale_modules,
            unassigned: record.unassigned.len(),
            excluded: record.do_not_document.len(),
            low_confidence: record.low_confidence.len(),
            last_analysis: record.last_analysis,
        })
    }

    pub fn is_up_to_date(&self) -> bool {
        self.baseline.as_ref() == Some(&self.head)
            && self.pending_new.is_empty()
            && self.pending_changed.is_empty()
            && self.pending_deleted.is_empty()
            && self.stale_modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_units_block_completion() {
        let mut report = SyncReport::new(Uuid::new_v4(), None, RevisionId::new("abc"));
        report.record_file("a.rs", UnitOutcome::Succeeded);
        report.record_file("b.rs", UnitOutcome::Skipped);
        assert!(report.is_complete());
        assert!(report.problems.is_empty());

        report.record_file("c.rs", UnitOutcome::Requeued("429".into()));
        assert!(!report.is_complete());
        assert_eq!(report.files.total(), 3);
        assert_eq!(report.problems[0].item, "c.rs");
    }

    #[test]
    fn test_module_failures_are_reported() {
        let mut report = SyncReport::new(Uuid::new_v4(), None, RevisionId::new("abc"));
        report.record_module("billing", UnitOutcome::Failed("too short".into()));
        assert_eq!(report.modules.failed, 1);
        assert!(!report.is_complete());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["problems"][0]["outcome"], "failed");
        assert_eq!(json["problems"][0]["reason"], "too short");
    }
}
