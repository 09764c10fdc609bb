//! Sync Orchestrator
//!
//! One run reconciles the documentation tree with a target revision:
//!
//! 1. **Detect**: classify the diff between the baseline and HEAD
//! 2. **Generate**: three tiers for every new file
//! 3. **Update**: diff-driven tier updates for changed files
//! 4. **Delete**: artifacts, log entries and module membership of removed files
//! 5. **Reassign**: rebuild the assignment index and place unassigned files
//! 6. **Regenerate**: narratives of modules with undocumented files
//! 7. **Advance**: move the baseline to HEAD once every file unit is clean
//!
//! File units run concurrently up to `sync.concurrency`, each holding its
//! path lock. A unit either commits all of its writes or none of them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use uuid::Uuid;

use super::classifier::{ChangeClassifier, ChangeSet};
use super::locks::PathLocks;
use super::report::{AssignmentOutcome, SyncReport, SyncStatus};
use super::unit::{UnitOutcome, UnitRunner};
use crate::ai::{
    AssignmentRequest, FileDoc, FileExcerpt, ModuleDocRequest, ModuleSummary, ResponseValidator,
    SharedGenerator, TierContent, TierRequest, TierUpdate, UpdateRequest, prompt::truncate_chars,
};
use crate::config::Config;
use crate::constants::generation::ASSIGNMENT_EXCERPT_CHARS;
use crate::modules::{
    AssignmentIndex, ModuleGraph, Narrative, Recommendation, narrative, partition_by_confidence,
};
use crate::storage::{SharedFileStore, SyncLog, TierStore, TierWrite};
use crate::types::{ErrorKind, Result, RevisionId, SourcePath, SyncError, Tier};
use crate::vcs::{RevisionOracle, SharedVcs, SourceFilter};

/// Generator output for a changed file
enum Revised {
    /// No usable diff or no prior artifacts; all three tiers regenerated
    Fresh(TierContent),
    Update(TierUpdate),
}

impl Revised {
    fn into_map(self) -> BTreeMap<Tier, String> {
        match self {
            Revised::Fresh(content) => content.into_map(),
            Revised::Update(update) => update.into_map(),
        }
    }
}

pub struct SyncOrchestrator {
    config: Arc<Config>,
    oracle: RevisionOracle,
    tiers: Arc<TierStore>,
    sync_log: Arc<SyncLog>,
    graph: Arc<ModuleGraph>,
    assignments: Arc<AssignmentIndex>,
    classifier: ChangeClassifier,
    generator: SharedGenerator,
    validator: ResponseValidator,
    locks: PathLocks,
    runner: UnitRunner,
}

impl SyncOrchestrator {
    /// Load the persisted state under `files` and wire the stores together
    pub async fn open(
        config: Arc<Config>,
        files: SharedFileStore,
        vcs: SharedVcs,
        generator: SharedGenerator,
    ) -> Result<Self> {
        config.validate()?;
        let oracle = RevisionOracle::new(vcs, SourceFilter::new(&config.sources)?);
        let tiers = Arc::new(TierStore::new(files.clone(), &config.docs));
        let sync_log = Arc::new(SyncLog::load(files.clone(), &config.docs.state_dir).await?);
        let graph = Arc::new(ModuleGraph::new(files.clone(), tiers.clone(), &config));
        let assignments = Arc::new(AssignmentIndex::load(files, &config.docs.state_dir).await?);
        let classifier = ChangeClassifier::new(
            oracle.clone(),
            sync_log.clone(),
            graph.clone(),
            assignments.clone(),
        );

        Ok(Self {
            validator: ResponseValidator::new(&config.generation),
            runner: UnitRunner::new(&config),
            locks: PathLocks::new(),
            config,
            oracle,
            tiers,
            sync_log,
            graph,
            assignments,
            classifier,
            generator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn oracle(&self) -> &RevisionOracle {
        &self.oracle
    }

    pub fn tiers(&self) -> &Arc<TierStore> {
        &self.tiers
    }

    pub fn sync_log(&self) -> &Arc<SyncLog> {
        &self.sync_log
    }

    pub fn graph(&self) -> &Arc<ModuleGraph> {
        &self.graph
    }

    pub fn assignments(&self) -> &Arc<AssignmentIndex> {
        &self.assignments
    }

    fn concurrency(&self) -> usize {
        self.config.sync.concurrency.max(1)
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Sync everything between the baseline and HEAD
    pub async fn sync(&self) -> Result<SyncReport> {
        let run_id = Uuid::new_v4();
        let head = self.oracle.resolve_head().await?;
        let baseline = self.sync_log.baseline().await;
        let span = info_span!("sync", run_id = %run_id, head = %head.short());

        async {
            info!(
                baseline = baseline.as_ref().map(|b| b.short()).unwrap_or("none"),
                "Starting sync"
            );
            let changes = self.classifier.classify(baseline.as_ref(), &head).await?;
            let advance = baseline.as_ref() != Some(&head);
            let report = SyncReport::new(run_id, baseline.clone(), head.clone());
            self.execute(report, changes, &head, advance).await
        }
        .instrument(span)
        .await
    }

    /// Sync only `paths` against HEAD; the baseline never moves
    pub async fn sync_files(&self, paths: &[SourcePath]) -> Result<SyncReport> {
        let run_id = Uuid::new_v4();
        let head = self.oracle.resolve_head().await?;
        let span = info_span!("sync_files", run_id = %run_id, head = %head.short());

        async {
            let changes = self.classifier.classify_files(paths, &head).await?;
            let report = SyncReport::new(run_id, self.sync_log.baseline().await, head.clone());
            self.execute(report, changes, &head, false).await
        }
        .instrument(span)
        .await
    }

    /// Pending work without touching anything
    pub async fn status(&self) -> Result<SyncStatus> {
        SyncStatus::collect(
            &self.oracle,
            &self.classifier,
            &self.sync_log,
            &self.graph,
            &self.assignments,
        )
        .await
    }

    async fn execute(
        &self,
        mut report: SyncReport,
        changes: ChangeSet,
        head: &RevisionId,
        advance: bool,
    ) -> Result<SyncReport> {
        for path in &changes.skipped {
            report.record_file(path.as_str(), UnitOutcome::Skipped);
        }

        let stale_modules = self.graph.modules_needing_regeneration().await?;
        if changes.is_empty() && stale_modules.is_empty() {
            if advance {
                self.sync_log.advance(head, Utc::now()).await?;
                report.advanced = true;
            }
            info!(advanced = report.advanced, "Nothing to sync");
            report.finish();
            return Ok(report);
        }
        if !changes.affected_modules.is_empty() {
            debug!(modules = ?changes.affected_modules, "Modules touched by this run");
        }

        self.generate_new(&changes.new, head, &mut report).await;
        self.update_changed(&changes.changed, head, &mut report).await;
        self.remove_deleted(&changes.deleted, &mut report).await;

        report.assignment = self.reassign().await?;
        self.regenerate_modules(head, &mut report).await?;

        if advance && report.files.is_clean() {
            self.sync_log.advance(head, Utc::now()).await?;
            report.advanced = true;
        } else if advance {
            warn!(
                requeued = report.files.requeued,
                failed = report.files.failed,
                "Baseline kept; pending files are retried next run"
            );
        }

        report.finish();
        info!(
            files = report.files.succeeded,
            modules = report.modules.succeeded,
            deleted = report.deleted,
            problems = report.problems.len(),
            advanced = report.advanced,
            "Sync finished"
        );
        Ok(report)
    }

    // =========================================================================
    // Phase 2: new files
    // =========================================================================

    async fn generate_new(&self, paths: &[SourcePath], head: &RevisionId, report: &mut SyncReport) {
        if paths.is_empty() {
            return;
        }
        info!(phase = "generate", units = paths.len(), "Phase started");

        let mut outcomes: Vec<(SourcePath, UnitOutcome)> = stream::iter(paths)
            .map(|path| async move {
                let _guard = self.locks.lock_path(path).await;
                let outcome = settle(path.as_str(), self.write_fresh(path, head).await);
                (path.clone(), outcome)
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, outcome) in outcomes {
            report.record_file(path.as_str(), outcome);
        }
    }

    /// Generate and write all three tiers; caller holds the path lock
    async fn write_fresh(&self, path: &SourcePath, head: &RevisionId) -> Result<UnitOutcome> {
        if self.sync_log.get(path).await.is_some()
            && !self.sync_log.needs_sync(path, head, &self.oracle).await?
        {
            return Ok(UnitOutcome::Skipped);
        }

        let content = self
            .runner
            .attempt(path.as_str(), || self.generate_fresh(path, head))
            .await?;
        self.commit(path, head, content.into_map()).await?;
        Ok(UnitOutcome::Succeeded)
    }

    async fn generate_fresh(&self, path: &SourcePath, head: &RevisionId) -> Result<TierContent> {
        let source = self.source_at(path, head).await?;
        let content = self
            .generator
            .generate_tiers(TierRequest {
                path: path.clone(),
                source,
                revision: head.clone(),
            })
            .await?;
        self.validator.validate_tiers(path.as_str(), &content)?;
        Ok(content)
    }

    async fn source_at(&self, path: &SourcePath, head: &RevisionId) -> Result<String> {
        self.oracle.content_at(path, head).await?.ok_or_else(|| {
            SyncError::revision("show", format!("{} is not present at {}", path, head.short()))
        })
    }

    /// Persist validated tiers, then the log entry
    async fn commit(
        &self,
        path: &SourcePath,
        head: &RevisionId,
        contents: BTreeMap<Tier, String>,
    ) -> Result<()> {
        // The owner is flagged before artifacts change
        if let Some(owner) = self.graph.owner_of(path).await? {
            self.graph.mark_undocumented(&owner, path).await?;
        }

        let written = self
            .tiers
            .write_atomic(
                path,
                TierWrite {
                    contents,
                    revision: Some(head.clone()),
                },
            )
            .await?;
        self.sync_log.set(path, head, Utc::now()).await?;
        debug!(path = %path, tiers = ?written, "Committed tiers");
        Ok(())
    }

    // =========================================================================
    // Phase 3: changed files
    // =========================================================================

    async fn update_changed(&self, paths: &[SourcePath], head: &RevisionId, report: &mut SyncReport) {
        if paths.is_empty() {
            return;
        }
        info!(phase = "update", units = paths.len(), "Phase started");

        let mut outcomes: Vec<(SourcePath, UnitOutcome)> = stream::iter(paths)
            .map(|path| async move {
                let _guard = self.locks.lock_path(path).await;
                let outcome = settle(path.as_str(), self.write_update(path, head).await);
                (path.clone(), outcome)
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        for (path, outcome) in outcomes {
            report.record_file(path.as_str(), outcome);
        }
    }

    async fn write_update(&self, path: &SourcePath, head: &RevisionId) -> Result<UnitOutcome> {
        let Some(entry) = self.sync_log.get(path).await else {
            return self.write_fresh(path, head).await;
        };
        // Another unit may have synced this path since classification
        if !self.sync_log.needs_sync(path, head, &self.oracle).await? {
            return Ok(UnitOutcome::Skipped);
        }

        let revised = self
            .runner
            .attempt(path.as_str(), || self.revise(path, &entry.revision, head))
            .await?;
        self.commit(path, head, revised.into_map()).await?;
        Ok(UnitOutcome::Succeeded)
    }

    async fn revise(&self, path: &SourcePath, from: &RevisionId, head: &RevisionId) -> Result<Revised> {
        let diff = self.oracle.file_diff(path, from, head).await?;
        let existing = self.tiers.read_all(path).await?;
        if diff.trim().is_empty() || existing.is_empty() {
            debug!(path = %path, "No usable diff or prior tiers, regenerating");
            return self.generate_fresh(path, head).await.map(Revised::Fresh);
        }

        let source = self.source_at(path, head).await?;
        let update = self
            .generator
            .update_tiers(UpdateRequest {
                path: path.clone(),
                source,
                diff,
                existing,
                revision: head.clone(),
            })
            .await?;
        self.validator.validate_update(path.as_str(), &update)?;
        Ok(Revised::Update(update))
    }

    // =========================================================================
    // Phase 4: deleted files
    // =========================================================================

    async fn remove_deleted(&self, paths: &[SourcePath], report: &mut SyncReport) {
        if paths.is_empty() {
            return;
        }
        info!(phase = "delete", units = paths.len(), "Phase started");

        for path in paths {
            let _guard = self.locks.lock_path(path).await;
            let outcome = settle(path.as_str(), self.remove_artifacts(path).await);
            if outcome == UnitOutcome::Succeeded {
                report.deleted += 1;
            }
            report.record_file(path.as_str(), outcome);
        }
    }

    async fn remove_artifacts(&self, path: &SourcePath) -> Result<UnitOutcome> {
        let removed = self.tiers.delete(path).await?;
        let tracked = self.sync_log.remove(path).await?;
        let owner = self.graph.owner_of(path).await?;
        if let Some(owner) = &owner {
            self.graph.remove_files(owner, std::slice::from_ref(path)).await?;
        }

        if removed == 0 && !tracked && owner.is_none() {
            return Ok(UnitOutcome::Skipped);
        }
        debug!(path = %path, artifacts = removed, module = ?owner, "Removed deleted file");
        Ok(UnitOutcome::Succeeded)
    }

    // =========================================================================
    // Phase 5: assignment
    // =========================================================================

    /// Files with a log entry and a micro artifact
    async fn documented_paths(&self) -> Result<Vec<SourcePath>> {
        let mut documented = Vec::new();
        for path in self.sync_log.paths().await {
            if self.tiers.exists(&path, Tier::Micro).await? {
                documented.push(path);
            }
        }
        Ok(documented)
    }

    #[instrument(skip_all)]
    async fn reassign(&self) -> Result<AssignmentOutcome> {
        let documented = self.documented_paths().await?;
        let record = self.assignments.rebuild(&self.graph, &documented).await?;
        let mut outcome = AssignmentOutcome::default();

        if !self.config.assignment.enabled || record.unassigned.is_empty() {
            return Ok(outcome);
        }

        let request = self.assignment_request(&record.unassigned).await?;
        outcome.analyzed = request.files.len();
        info!(phase = "reassign", files = outcome.analyzed, "Phase started");

        let suggested = self
            .runner
            .attempt("assignment", || {
                self.generator.suggest_assignments(request.clone())
            })
            .await;
        let suggested = match suggested {
            Ok(recommendations) => recommendations,
            Err(e) => {
                warn!(error = %e, "Assignment suggestion failed");
                outcome.failed = true;
                return Ok(outcome);
            }
        };

        let offered: BTreeSet<&SourcePath> = record.unassigned.iter().collect();
        let suggested: Vec<Recommendation> = suggested
            .into_iter()
            .map(|mut rec| {
                rec.files.retain(|p| offered.contains(p));
                rec
            })
            .filter(|rec| !rec.files.is_empty())
            .collect();

        let (accepted, low) =
            partition_by_confidence(suggested, self.config.assignment.confidence_threshold);
        for rec in &accepted {
            match self.apply_recommendation(rec).await {
                Ok(()) => outcome.applied += 1,
                Err(e) if e.kind() == ErrorKind::DataIntegrity => {
                    warn!(module = %rec.module_slug, error = %e, "Recommendation rejected");
                    outcome.rejected += 1;
                }
                Err(e) => return Err(e),
            }
        }
        outcome.low_confidence = low.len();
        self.assignments.record_analysis(low, Utc::now()).await?;

        if outcome.applied > 0 {
            self.assignments.rebuild(&self.graph, &documented).await?;
        }
        info!(
            applied = outcome.applied,
            low_confidence = outcome.low_confidence,
            rejected = outcome.rejected,
            "Assignment finished"
        );
        Ok(outcome)
    }

    async fn assignment_request(&self, unassigned: &[SourcePath]) -> Result<AssignmentRequest> {
        let mut files = Vec::with_capacity(unassigned.len());
        for path in unassigned {
            let excerpt = match self.tiers.read(path, Tier::Standard).await? {
                Some(text) => text,
                None => self.tiers.read(path, Tier::Micro).await?.unwrap_or_default(),
            };
            files.push(FileExcerpt {
                path: path.clone(),
                excerpt: truncate_chars(&excerpt, ASSIGNMENT_EXCERPT_CHARS),
            });
        }

        let modules = self
            .graph
            .all_modules()
            .await?
            .into_iter()
            .map(|m| ModuleSummary {
                slug: m.slug,
                name: m.name,
                summary: m.summary,
            })
            .collect();

        Ok(AssignmentRequest {
            files,
            modules,
            min_files_per_module: self.config.assignment.min_files_per_module,
        })
    }

    /// Existing modules gain the files as undocumented; unknown slugs are created
    async fn apply_recommendation(&self, rec: &Recommendation) -> Result<()> {
        if self.graph.exists(&rec.module_slug).await? {
            let added = self.graph.add_files(&rec.module_slug, &rec.files, false).await?;
            debug!(module = %rec.module_slug, added, "Applied recommendation");
        } else {
            let name = rec.module_name.as_deref().unwrap_or(&rec.module_slug);
            let description = rec.description.as_deref().unwrap_or_default();
            self.graph
                .create(&rec.module_slug, name, description, &rec.files)
                .await?;
        }
        Ok(())
    }

    // =========================================================================
    // Phase 6: module narratives
    // =========================================================================

    async fn regenerate_modules(&self, head: &RevisionId, report: &mut SyncReport) -> Result<()> {
        let slugs = self.graph.modules_needing_regeneration().await?;
        if slugs.is_empty() {
            return Ok(());
        }
        info!(phase = "regenerate", units = slugs.len(), "Phase started");

        let mut outcomes: Vec<(String, UnitOutcome)> = stream::iter(slugs)
            .map(|slug| async move {
                let _guard = self.locks.lock_module(&slug).await;
                let outcome = settle(&slug, self.rebuild_narrative(&slug, head).await);
                (slug, outcome)
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        outcomes.sort_by(|a, b| a.0.cmp(&b.0));
        for (slug, outcome) in outcomes {
            report.record_module(slug, outcome);
        }
        Ok(())
    }

    async fn rebuild_narrative(&self, slug: &str, head: &RevisionId) -> Result<UnitOutcome> {
        let Some(module) = self.graph.load(slug).await? else {
            return Ok(UnitOutcome::Skipped);
        };

        let mut new_files = Vec::new();
        for path in &module.undocumented_files {
            let doc = match self.tiers.read(path, Tier::Expansive).await? {
                Some(doc) => Some(doc),
                None => self.tiers.read(path, Tier::Standard).await?,
            };
            match doc {
                Some(doc) => new_files.push(FileDoc {
                    path: path.clone(),
                    doc,
                }),
                None => debug!(module = slug, path = %path, "No tiers yet, left undocumented"),
            }
        }
        if new_files.is_empty() {
            return Ok(UnitOutcome::Skipped);
        }

        let previous = self.graph.read_narrative(slug).await?;
        let current_document = previous.as_deref().and_then(|text| match narrative::parse(text) {
            Ok(doc) => Some(doc.render_body()),
            Err(e) => {
                warn!(module = slug, error = %e, "Existing narrative is malformed, regenerating from scratch");
                None
            }
        });
        let request = ModuleDocRequest {
            slug: slug.to_string(),
            module_name: module.name.clone(),
            current_document,
            new_files,
        };

        let body = self
            .runner
            .attempt(slug, || {
                let request = request.clone();
                async move {
                    let body = self.generator.regenerate_module_document(request).await?;
                    self.validator.validate_module(slug, &body)?;
                    Ok(body)
                }
            })
            .await?;

        let now = Utc::now();
        let meta = vec![
            ("module_name".to_string(), module.name.replace('\n', " ")),
            ("module_slug".to_string(), slug.to_string()),
            ("generated_at".to_string(), now.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("total_files".to_string(), module.statistics.total.to_string()),
            ("revision".to_string(), head.to_string()),
        ];
        let document = Narrative::from_body(meta, &body);
        document
            .validate()
            .map_err(|e| SyncError::invalid_response(slug, e.to_string()))?;
        let summary = document.overview().unwrap_or_default().to_string();
        let documented: Vec<SourcePath> = request.new_files.iter().map(|f| f.path.clone()).collect();

        self.graph.write_narrative(slug, &document.render()).await?;
        if let Err(e) = self
            .graph
            .complete_regeneration(slug, &documented, &summary, head)
            .await
        {
            if let Err(restore) = self.graph.restore_narrative(slug, previous.as_deref()).await {
                warn!(module = slug, error = %restore, "Could not restore previous narrative");
            }
            return Err(e);
        }
        self.sync_log.set_module(slug, head, now).await?;

        info!(module = slug, files = documented.len(), "Regenerated narrative");
        Ok(UnitOutcome::Succeeded)
    }
}

/// Turn a unit result into its outcome, logging failures
fn settle(item: &str, result: Result<UnitOutcome>) -> UnitOutcome {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            let outcome = UnitOutcome::from_error(&e);
            warn!(unit = item, error = %e, outcome = %outcome, "Unit did not complete");
            outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStore, MemoryFileStore};
    use crate::testing::{GeneratorCall, MemoryVcs, Scripted, ScriptedGenerator};
    use std::path::PathBuf;

    const FOO: &str = "app/Services/Foo.php";

    struct Harness {
        files: Arc<MemoryFileStore>,
        vcs: Arc<MemoryVcs>,
        generator: Arc<ScriptedGenerator>,
        sync: SyncOrchestrator,
    }

    fn quick_config() -> Config {
        let mut config = Config::default();
        config.sync.retry_count = 0;
        config.sync.rate_limit_backoff_secs = 0;
        config
    }

    async fn harness(config: Config) -> Harness {
        let files = Arc::new(MemoryFileStore::new());
        let vcs = Arc::new(MemoryVcs::new());
        let generator = Arc::new(ScriptedGenerator::new());
        let sync = SyncOrchestrator::open(
            Arc::new(config),
            files.clone(),
            vcs.clone(),
            generator.clone(),
        )
        .await
        .unwrap();
        Harness {
            files,
            vcs,
            generator,
            sync,
        }
    }

    fn path(p: &str) -> SourcePath {
        SourcePath::new(p).unwrap()
    }

    async fn snapshot(files: &MemoryFileStore) -> BTreeMap<PathBuf, String> {
        let mut out = BTreeMap::new();
        for p in files.paths() {
            let content = files.read(&p).await.unwrap().unwrap();
            out.insert(p, content);
        }
        out
    }

    fn generate_calls(generator: &ScriptedGenerator) -> usize {
        generator
            .calls()
            .iter()
            .filter(|c| matches!(c, GeneratorCall::Generate(_)))
            .count()
    }

    #[tokio::test]
    async fn test_new_file_gets_all_tiers() {
        let h = harness(quick_config()).await;
        let head = h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);

        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.files.succeeded, 1);
        assert!(report.is_complete());
        assert!(report.advanced);
        let foo = path(FOO);
        assert!(h.sync.tiers().exists_all(&foo, &Tier::ALL).await.unwrap());
        assert_eq!(h.sync.tiers().recorded_revision(&foo).await.unwrap(), Some(head.clone()));
        assert_eq!(h.sync.sync_log().get(&foo).await.unwrap().revision, head);
        assert_eq!(h.sync.sync_log().baseline().await, Some(head));
    }

    #[tokio::test]
    async fn test_unchanged_update_only_restamps_expansive() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);
        h.sync.sync().await.unwrap();
        let foo = path(FOO);
        let micro = h.sync.tiers().read(&foo, Tier::Micro).await.unwrap();
        let standard = h.sync.tiers().read(&foo, Tier::Standard).await.unwrap();

        let head = h.vcs.commit(&[(FOO, Some("<?php\nclass Foo {}\n"))]);
        h.generator.script_update(FOO, Scripted::Reply(TierUpdate::default()));
        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.files.succeeded, 1);
        assert!(h.generator.calls().contains(&GeneratorCall::Update(FOO.to_string())));
        assert_eq!(h.sync.tiers().read(&foo, Tier::Micro).await.unwrap(), micro);
        assert_eq!(h.sync.tiers().read(&foo, Tier::Standard).await.unwrap(), standard);
        assert_eq!(h.sync.tiers().recorded_revision(&foo).await.unwrap(), Some(head.clone()));
        assert_eq!(h.sync.sync_log().get(&foo).await.unwrap().revision, head);
    }

    #[tokio::test]
    async fn test_update_with_stale_marker_is_stamped_with_head() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);
        h.sync.sync().await.unwrap();
        let foo = path(FOO);
        let micro = h.sync.tiers().read(&foo, Tier::Micro).await.unwrap();
        let standard = h.sync.tiers().read(&foo, Tier::Standard).await.unwrap();

        let head = h.vcs.commit(&[(FOO, Some("<?php\nclass Foo { }\n"))]);
        let expansive = format!(
            "{}\n\nrevision: 0123456789abcdef\n",
            ScriptedGenerator::default_tiers(FOO).expansive
        );
        h.generator.script_update(
            FOO,
            Scripted::Reply(TierUpdate {
                micro: None,
                standard: None,
                expansive: Some(expansive),
            }),
        );
        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.files.succeeded, 1);
        assert_eq!(h.sync.tiers().read(&foo, Tier::Micro).await.unwrap(), micro);
        assert_eq!(h.sync.tiers().read(&foo, Tier::Standard).await.unwrap(), standard);
        assert_eq!(h.sync.tiers().recorded_revision(&foo).await.unwrap(), Some(head.clone()));
        let written = h.sync.tiers().read(&foo, Tier::Expansive).await.unwrap().unwrap();
        assert!(!written.contains("0123456789abcdef"));
        assert_eq!(h.sync.sync_log().get(&foo).await.unwrap().revision, head);
    }

    #[tokio::test]
    async fn test_blank_diff_regenerates_all_tiers() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("v1"))]);
        h.sync.sync().await.unwrap();
        h.vcs.commit(&[(FOO, Some("v2"))]);
        h.vcs.blank_diff(FOO);
        h.generator.clear_calls();

        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.files.succeeded, 1);
        let calls = h.generator.calls();
        assert_eq!(calls[0], GeneratorCall::Generate(FOO.to_string()));
        assert!(!calls.iter().any(|c| matches!(c, GeneratorCall::Update(_))));
    }

    #[tokio::test]
    async fn test_changed_file_cascades_to_its_module() {
        let h = harness(quick_config()).await;
        let (invoice, payment) = ("app/Billing/Invoice.php", "app/Billing/Payment.php");
        h.vcs.commit(&[(invoice, Some("i1")), (payment, Some("p1"))]);
        h.sync.sync().await.unwrap();
        h.sync
            .graph()
            .create("billing", "Billing", "", &[path(invoice), path(payment)])
            .await
            .unwrap();

        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.modules.succeeded, 1);
        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert_eq!(module.documented_files.len(), 2);
        let doc = narrative::parse(&h.sync.graph().read_narrative("billing").await.unwrap().unwrap())
            .unwrap();
        assert_eq!(doc.get("module_slug"), Some("billing"));
        assert_eq!(doc.get("total_files"), Some("2"));
        assert!(h.sync.sync_log().module_entry("billing").await.is_some());

        // Regeneration fails, so the changed file stays undocumented
        let head = h.vcs.commit(&[(invoice, Some("i2"))]);
        h.generator.script_module("billing", Scripted::ContextTooLong);
        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.files.succeeded, 1);
        assert_eq!(report.modules.failed, 1);
        assert!(report.advanced);
        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert_eq!(module.undocumented_files, vec![path(invoice)]);
        assert!(module.is_documented(&path(payment)));

        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.modules.succeeded, 1);
        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert!(module.undocumented_files.is_empty());
        assert_eq!(module.last_synced_revision, Some(head));
    }

    #[tokio::test]
    async fn test_rate_limited_file_is_requeued() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);
        h.generator.script_tiers(FOO, Scripted::RateLimited);

        let report = h.sync.sync().await.unwrap();

        let foo = path(FOO);
        assert_eq!(report.files.requeued, 1);
        assert!(!report.advanced);
        assert!(!h.sync.tiers().exists(&foo, Tier::Micro).await.unwrap());
        assert!(h.sync.sync_log().get(&foo).await.is_none());
        assert!(h.sync.sync_log().baseline().await.is_none());

        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.files.succeeded, 1);
        assert!(report.advanced);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_within_the_run() {
        let mut config = quick_config();
        config.sync.retry_count = 2;
        let h = harness(config).await;
        h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);
        h.generator.script_tiers(FOO, Scripted::RateLimited);

        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.files.succeeded, 1);
        assert_eq!(generate_calls(&h.generator), 2);
    }

    #[tokio::test]
    async fn test_second_run_writes_nothing() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("a")), ("src/lib.rs", Some("b"))]);
        h.sync.sync().await.unwrap();
        let before = snapshot(&h.files).await;
        h.generator.clear_calls();

        let report = h.sync.sync().await.unwrap();

        assert!(report.is_noop());
        assert!(h.generator.calls().is_empty());
        assert_eq!(snapshot(&h.files).await, before);
    }

    #[tokio::test]
    async fn test_module_file_without_tiers_does_not_keep_runs_busy() {
        let h = harness(quick_config()).await;
        let (invoice, util) = ("app/Billing/Invoice.php", "app/Support/Util.php");
        h.vcs.commit(&[(invoice, Some("i")), (util, Some("u"))]);
        h.sync
            .graph()
            .create("billing", "Billing", "", &[path(invoice), path("app/Billing/Gone.php")])
            .await
            .unwrap();
        h.generator.set_recommendations(vec![recommendation("support", &[util], 0.4)]);

        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.modules.succeeded, 1);
        assert_eq!(report.assignment.low_confidence, 1);
        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert_eq!(module.undocumented_files, vec![path("app/Billing/Gone.php")]);

        let before = snapshot(&h.files).await;
        h.generator.clear_calls();
        let report = h.sync.sync().await.unwrap();

        assert!(report.is_noop());
        assert!(h.generator.calls().is_empty());
        assert_eq!(snapshot(&h.files).await, before);
        assert!(h.sync.graph().modules_needing_regeneration().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_tier_write_leaves_nothing_behind() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);
        h.files.fail_writes_containing("docs/files/full");

        let report = h.sync.sync().await.unwrap();

        let foo = path(FOO);
        assert!(!report.files.is_clean());
        assert!(!report.advanced);
        for tier in Tier::ALL {
            assert!(!h.sync.tiers().exists(&foo, tier).await.unwrap());
        }
        assert!(h.sync.sync_log().get(&foo).await.is_none());

        h.files.clear_failures();
        let report = h.sync.sync().await.unwrap();
        assert_eq!(report.files.succeeded, 1);
        assert!(h.sync.tiers().exists_all(&foo, &Tier::ALL).await.unwrap());
    }

    #[tokio::test]
    async fn test_synced_revision_never_moves_backwards() {
        let h = harness(quick_config()).await;
        let first = h.vcs.commit(&[(FOO, Some("foo"))]);
        h.sync.sync().await.unwrap();
        h.vcs.commit(&[("app/Bar.php", Some("bar"))]);
        h.generator.clear_calls();

        let report = h.sync.sync_files(&[path(FOO), path("app/Bar.php")]).await.unwrap();

        assert_eq!(report.files.skipped, 1);
        assert_eq!(report.files.succeeded, 1);
        assert!(!report.advanced);
        assert_eq!(h.sync.sync_log().get(&path(FOO)).await.unwrap().revision, first);
        assert_eq!(h.sync.sync_log().baseline().await, Some(first));
        assert_eq!(h.generator.calls()[0], GeneratorCall::Generate("app/Bar.php".to_string()));
    }

    #[tokio::test]
    async fn test_placeholder_response_fails_without_retry() {
        let mut config = quick_config();
        config.sync.retry_count = 3;
        let h = harness(config).await;
        h.vcs.commit(&[(FOO, Some("<?php class Foo {}"))]);
        let mut content = ScriptedGenerator::default_tiers(FOO);
        content.micro = "[PLACEHOLDER] one line summary of Foo".to_string();
        h.generator.script_tiers(FOO, Scripted::Reply(content));

        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.files.failed, 1);
        assert_eq!(generate_calls(&h.generator), 1);
        assert!(matches!(report.problems[0].outcome, UnitOutcome::Failed(_)));
        assert!(!h.sync.tiers().exists(&path(FOO), Tier::Micro).await.unwrap());
    }

    #[tokio::test]
    async fn test_deleted_file_is_removed_everywhere() {
        let h = harness(quick_config()).await;
        let (invoice, payment) = ("app/Billing/Invoice.php", "app/Billing/Payment.php");
        h.vcs.commit(&[(invoice, Some("i")), (payment, Some("p"))]);
        h.sync.sync().await.unwrap();
        h.sync
            .graph()
            .create("billing", "Billing", "", &[path(invoice), path(payment)])
            .await
            .unwrap();
        h.sync.sync().await.unwrap();

        h.vcs.commit(&[(invoice, None)]);
        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.deleted, 1);
        assert!(report.advanced);
        for tier in Tier::ALL {
            assert!(!h.sync.tiers().exists(&path(invoice), tier).await.unwrap());
        }
        assert!(h.sync.sync_log().get(&path(invoice)).await.is_none());
        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert_eq!(module.all_paths(), vec![path(payment)]);
    }

    fn recommendation(slug: &str, files: &[&str], confidence: f64) -> Recommendation {
        Recommendation {
            module_slug: slug.to_string(),
            module_name: None,
            description: Some(format!("{} files", slug)),
            files: files.iter().map(|f| path(f)).collect(),
            confidence,
            reason: String::new(),
        }
    }

    #[tokio::test]
    async fn test_confident_recommendations_are_applied() {
        let h = harness(quick_config()).await;
        let (invoice, payment, util) = (
            "app/Billing/Invoice.php",
            "app/Billing/Payment.php",
            "app/Support/Util.php",
        );
        h.vcs.commit(&[(invoice, Some("i")), (payment, Some("p")), (util, Some("u"))]);
        h.generator.set_recommendations(vec![
            recommendation("billing", &[invoice, payment, "app/Unknown.php"], 0.9),
            recommendation("tiny", &[util], 0.95),
            recommendation("support", &[util], 0.4),
        ]);

        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.assignment.analyzed, 3);
        assert_eq!(report.assignment.applied, 1);
        assert_eq!(report.assignment.rejected, 1);
        assert_eq!(report.assignment.low_confidence, 1);
        assert_eq!(report.modules.succeeded, 1);

        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert_eq!(module.name, "billing");
        assert_eq!(module.documented_files.len(), 2);
        let record = h.sync.assignments().snapshot().await;
        assert_eq!(record.unassigned, vec![path(util)]);
        assert_eq!(record.low_confidence[0].module_slug, "support");
        assert!(record.last_analysis.is_some());
    }

    #[tokio::test]
    async fn test_existing_module_gains_files_as_undocumented() {
        let h = harness(quick_config()).await;
        let (invoice, payment, refund) = (
            "app/Billing/Invoice.php",
            "app/Billing/Payment.php",
            "app/Billing/Refund.php",
        );
        h.vcs.commit(&[(invoice, Some("i")), (payment, Some("p"))]);
        h.sync.sync().await.unwrap();
        h.sync
            .graph()
            .create("billing", "Billing", "", &[path(invoice), path(payment)])
            .await
            .unwrap();
        h.sync.sync().await.unwrap();

        h.vcs.commit(&[(refund, Some("r"))]);
        h.generator.set_recommendations(vec![recommendation("billing", &[refund], 0.8)]);
        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.assignment.applied, 1);
        assert_eq!(report.modules.succeeded, 1);
        let module = h.sync.graph().load("billing").await.unwrap().unwrap();
        assert!(module.is_documented(&path(refund)));
        assert_eq!(module.statistics.total, 3);
    }

    #[tokio::test]
    async fn test_disabled_assignment_never_asks_the_generator() {
        let mut config = quick_config();
        config.assignment.enabled = false;
        let h = harness(config).await;
        h.vcs.commit(&[(FOO, Some("foo"))]);
        h.generator.set_recommendations(vec![recommendation("core", &[FOO], 1.0)]);

        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.assignment, AssignmentOutcome::default());
        assert!(!h.generator.calls().iter().any(|c| matches!(c, GeneratorCall::Assign(_))));
        assert!(!h.sync.graph().exists("core").await.unwrap());
        assert_eq!(h.sync.assignments().snapshot().await.unassigned, vec![path(FOO)]);
    }

    #[tokio::test]
    async fn test_excluded_files_are_not_documented() {
        let h = harness(quick_config()).await;
        h.sync.assignments().exclude(&path(FOO)).await.unwrap();
        h.vcs.commit(&[(FOO, Some("foo")), ("app/Bar.php", Some("bar"))]);

        let report = h.sync.sync().await.unwrap();

        assert_eq!(report.files.succeeded, 1);
        assert!(!h.sync.tiers().exists(&path(FOO), Tier::Micro).await.unwrap());
        assert_eq!(h.sync.assignments().snapshot().await.unassigned, vec![path("app/Bar.php")]);
    }

    #[tokio::test]
    async fn test_status_reports_pending_work() {
        let h = harness(quick_config()).await;
        h.vcs.commit(&[(FOO, Some("foo"))]);

        let status = h.sync.status().await.unwrap();
        assert_eq!(status.pending_new, vec![path(FOO)]);
        assert!(!status.is_up_to_date());

        h.sync.sync().await.unwrap();
        let status = h.sync.status().await.unwrap();
        assert!(status.is_up_to_date());
        assert_eq!(status.tracked_files, 1);
        assert_eq!(status.unassigned, 1);
    }
}
