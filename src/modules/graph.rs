//! Module graph
//!
//! One JSON record per module at `{modules_dir}/{slug}.json` and its
//! narrative document at `{modules_dir}/{slug}.md`. Mutations run under a
//! graph-wide lock because ownership checks read every record.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::types::{DocumentedFile, Module, validate_slug};
use crate::config::Config;
use crate::storage::{SharedFileStore, TierStore, read_json, write_json};
use crate::types::{IntegrityError, Result, RevisionId, SourcePath, Tier, TierLabel};

pub struct ModuleGraph {
    files: SharedFileStore,
    tiers: Arc<TierStore>,
    dir: PathBuf,
    min_files: usize,
    write_lock: Mutex<()>,
}

impl ModuleGraph {
    pub fn new(files: SharedFileStore, tiers: Arc<TierStore>, config: &Config) -> Self {
        Self {
            files,
            tiers,
            dir: config.docs.modules_dir.clone(),
            min_files: config.assignment.min_files_per_module,
            write_lock: Mutex::new(()),
        }
    }

    fn record_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.json", slug))
    }

    pub fn narrative_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{}.md", slug))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn load(&self, slug: &str) -> Result<Option<Module>> {
        read_json(self.files.as_ref(), &self.record_path(slug)).await
    }

    async fn require(&self, slug: &str) -> Result<Module> {
        self.load(slug)
            .await?
            .ok_or_else(|| IntegrityError::ModuleNotFound(slug.to_string()).into())
    }

    pub async fn exists(&self, slug: &str) -> Result<bool> {
        self.files.exists(&self.record_path(slug)).await
    }

    /// Every module slug, sorted
    pub async fn all_slugs(&self) -> Result<Vec<String>> {
        let mut slugs: Vec<String> = self
            .files
            .list(&self.dir)
            .await?
            .iter()
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        slugs.sort();
        Ok(slugs)
    }

    /// Every module, in slug order
    pub async fn all_modules(&self) -> Result<Vec<Module>> {
        let mut modules = Vec::new();
        for slug in self.all_slugs().await? {
            if let Some(module) = self.load(&slug).await? {
                modules.push(module);
            }
        }
        Ok(modules)
    }

    /// Owning module of `path`; the first in slug order wins
    pub async fn owner_of(&self, path: &SourcePath) -> Result<Option<String>> {
        for module in self.all_modules().await? {
            if module.contains(path) {
                return Ok(Some(module.slug));
            }
        }
        Ok(None)
    }

    /// Slugs of modules with an undocumented file that already has tiers
    /// to narrate from, sorted. Files without tiers wait for a file sync.
    pub async fn modules_needing_regeneration(&self) -> Result<Vec<String>> {
        let mut slugs = Vec::new();
        for module in self.all_modules().await? {
            for path in &module.undocumented_files {
                if self.has_narrative_source(path).await? {
                    slugs.push(module.slug.clone());
                    break;
                }
            }
        }
        Ok(slugs)
    }

    async fn has_narrative_source(&self, path: &SourcePath) -> Result<bool> {
        Ok(self.tiers.exists(path, Tier::Expansive).await?
            || self.tiers.exists(path, Tier::Standard).await?)
    }

    pub async fn read_narrative(&self, slug: &str) -> Result<Option<String>> {
        self.files.read(&self.narrative_path(slug)).await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Persist `module`, recomputing statistics and the update timestamp
    pub async fn save(&self, module: &mut Module) -> Result<()> {
        module.recompute_stats();
        module.updated_at = Utc::now();
        write_json(self.files.as_ref(), &self.record_path(&module.slug), module).await
    }

    pub async fn write_narrative(&self, slug: &str, document: &str) -> Result<()> {
        self.files.write(&self.narrative_path(slug), document).await
    }

    /// Put back a narrative captured before a failed regeneration
    pub async fn restore_narrative(&self, slug: &str, previous: Option<&str>) -> Result<()> {
        match previous {
            Some(document) => self.write_narrative(slug, document).await,
            None => self
                .files
                .delete(&self.narrative_path(slug))
                .await
                .map(|_| ()),
        }
    }

    /// Reject any path owned by a module other than `slug`
    async fn check_ownership(&self, slug: &str, paths: &[SourcePath]) -> Result<()> {
        let others: Vec<Module> = self
            .all_modules()
            .await?
            .into_iter()
            .filter(|m| m.slug != slug)
            .collect();
        for path in paths {
            if let Some(owner) = others.iter().find(|m| m.contains(path)) {
                return Err(IntegrityError::PathOwnedByOtherModule {
                    path: path.to_string(),
                    owner: owner.slug.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Create a module whose files all start undocumented
    pub async fn create(
        &self,
        slug: &str,
        name: &str,
        description: &str,
        paths: &[SourcePath],
    ) -> Result<Module> {
        validate_slug(slug)?;
        let unique: Vec<SourcePath> = paths
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if unique.len() < self.min_files {
            return Err(IntegrityError::FileListTooSmall {
                min: self.min_files,
                actual: unique.len(),
            }
            .into());
        }

        let _guard = self.write_lock.lock().await;
        if self.exists(slug).await? {
            return Err(IntegrityError::ModuleAlreadyExists(slug.to_string()).into());
        }
        self.check_ownership(slug, &unique).await?;

        let mut module = Module::new(slug, name, description);
        module.undocumented_files = unique;
        self.save(&mut module).await?;
        info!(slug, files = module.statistics.total, "Created module");
        Ok(module)
    }

    /// Add paths not already present; returns how many were added
    pub async fn add_files(&self, slug: &str, paths: &[SourcePath], documented: bool) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut module = self.require(slug).await?;
        let fresh: Vec<SourcePath> = paths
            .iter()
            .filter(|p| !module.contains(p))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if fresh.is_empty() {
            return Ok(0);
        }
        self.check_ownership(slug, &fresh).await?;

        let now = Utc::now();
        for path in &fresh {
            if documented {
                let tier = TierLabel::from(self.tiers.highest_tier(path).await?);
                module.documented_files.push(DocumentedFile {
                    path: path.clone(),
                    tier,
                    added_at: now,
                });
            } else {
                module.undocumented_files.push(path.clone());
            }
        }
        self.save(&mut module).await?;
        debug!(slug, added = fresh.len(), documented, "Added files to module");
        Ok(fresh.len())
    }

    /// Remove paths from both lists; returns how many were removed
    pub async fn remove_files(&self, slug: &str, paths: &[SourcePath]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut module = self.require(slug).await?;
        let before = module.documented_files.len() + module.undocumented_files.len();
        module.documented_files.retain(|f| !paths.contains(&f.path));
        module.undocumented_files.retain(|p| !paths.contains(p));
        let removed = before - module.documented_files.len() - module.undocumented_files.len();
        if removed > 0 {
            self.save(&mut module).await?;
        }
        Ok(removed)
    }

    /// Move paths from undocumented to documented
    pub async fn mark_documented(&self, slug: &str, paths: &[SourcePath]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let mut module = self.require(slug).await?;
        let moved = self.move_to_documented(&mut module, paths).await?;
        if moved > 0 {
            self.save(&mut module).await?;
        }
        Ok(moved)
    }

    async fn move_to_documented(&self, module: &mut Module, paths: &[SourcePath]) -> Result<usize> {
        let now = Utc::now();
        let mut moved = 0;
        for path in paths {
            let Some(pos) = module.undocumented_files.iter().position(|p| p == path) else {
                continue;
            };
            module.undocumented_files.remove(pos);
            let tier = TierLabel::from(self.tiers.highest_tier(path).await?);
            module.documented_files.push(DocumentedFile {
                path: path.clone(),
                tier,
                added_at: now,
            });
            moved += 1;
        }
        Ok(moved)
    }

    /// Move a path back to undocumented because its source changed
    pub async fn mark_undocumented(&self, slug: &str, path: &SourcePath) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut module = self.require(slug).await?;
        let Some(pos) = module.documented_files.iter().position(|f| &f.path == path) else {
            return Ok(false);
        };
        module.documented_files.remove(pos);
        module.undocumented_files.push(path.clone());
        self.save(&mut module).await?;
        debug!(slug, path = %path, "Marked undocumented");
        Ok(true)
    }

    /// Record a successful narrative regeneration in one save
    pub async fn complete_regeneration(
        &self,
        slug: &str,
        paths: &[SourcePath],
        summary: &str,
        revision: &RevisionId,
    ) -> Result<Module> {
        let _guard = self.write_lock.lock().await;
        let mut module = self.require(slug).await?;
        self.move_to_documented(&mut module, paths).await?;
        module.summary = summary.to_string();
        module.last_synced_revision = Some(revision.clone());
        self.save(&mut module).await?;
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryFileStore, TierWrite};
    use crate::types::SyncError;

    fn path(p: &str) -> SourcePath {
        SourcePath::new(p).unwrap()
    }

    fn setup() -> (Arc<TierStore>, ModuleGraph) {
        let files = Arc::new(MemoryFileStore::new());
        let config = Config::default();
        let tiers = Arc::new(TierStore::new(files.clone(), &config.docs));
        let graph = ModuleGraph::new(files, tiers.clone(), &config);
        (tiers, graph)
    }

    fn integrity(err: SyncError) -> IntegrityError {
        match err {
            SyncError::Integrity(e) => e,
            other => panic!("expected integrity error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let (_, graph) = setup();
        let module = graph
            .create("billing", "Billing", "Invoices", &[path("app/A.php"), path("app/B.php")])
            .await
            .unwrap();
        assert_eq!(module.statistics.undocumented, 2);

        let loaded = graph.load("billing").await.unwrap().unwrap();
        assert_eq!(loaded.undocumented_files, vec![path("app/A.php"), path("app/B.php")]);
        assert_eq!(graph.all_slugs().await.unwrap(), vec!["billing".to_string()]);
    }

    #[tokio::test]
    async fn test_create_rejections_happen_before_mutation() {
        let (_, graph) = setup();
        let two = [path("app/A.php"), path("app/B.php")];

        let err = graph.create("Bad Slug", "x", "", &two).await.unwrap_err();
        assert!(matches!(integrity(err), IntegrityError::InvalidSlug(_)));

        let err = graph.create("solo", "x", "", &[path("app/A.php")]).await.unwrap_err();
        assert_eq!(
            integrity(err),
            IntegrityError::FileListTooSmall { min: 2, actual: 1 }
        );
        assert!(graph.all_slugs().await.unwrap().is_empty());

        graph.create("billing", "Billing", "", &two).await.unwrap();
        let err = graph.create("billing", "Again", "", &two).await.unwrap_err();
        assert!(matches!(integrity(err), IntegrityError::ModuleAlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_cross_module_ownership_rejected() {
        let (_, graph) = setup();
        graph
            .create("billing", "Billing", "", &[path("app/A.php"), path("app/B.php")])
            .await
            .unwrap();
        graph
            .create("auth", "Auth", "", &[path("app/C.php"), path("app/D.php")])
            .await
            .unwrap();

        let err = graph
            .add_files("auth", &[path("app/A.php")], false)
            .await
            .unwrap_err();
        assert!(matches!(
            integrity(err),
            IntegrityError::PathOwnedByOtherModule { .. }
        ));
        assert_eq!(graph.owner_of(&path("app/A.php")).await.unwrap().as_deref(), Some("billing"));
    }

    #[tokio::test]
    async fn test_add_files_is_idempotent_and_probes_tier() {
        let (tiers, graph) = setup();
        graph
            .create("billing", "Billing", "", &[path("app/A.php"), path("app/B.php")])
            .await
            .unwrap();
        tiers
            .write_atomic(
                &path("app/C.php"),
                TierWrite::new(None)
                    .with(Tier::Micro, "micro")
                    .with(Tier::Standard, "standard"),
            )
            .await
            .unwrap();

        let added = graph
            .add_files("billing", &[path("app/A.php"), path("app/C.php"), path("app/D.php")], true)
            .await
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(
            graph.add_files("billing", &[path("app/C.php")], true).await.unwrap(),
            0
        );

        let module = graph.load("billing").await.unwrap().unwrap();
        let c = module.documented_files.iter().find(|f| f.path == path("app/C.php")).unwrap();
        assert_eq!(c.tier, TierLabel::Standard);
        let d = module.documented_files.iter().find(|f| f.path == path("app/D.php")).unwrap();
        assert_eq!(d.tier, TierLabel::Unknown);
        assert_eq!(module.statistics.total, 4);
    }

    #[tokio::test]
    async fn test_missing_module_is_rejected() {
        let (_, graph) = setup();
        let err = graph.add_files("nope", &[path("app/A.php")], false).await.unwrap_err();
        assert!(matches!(integrity(err), IntegrityError::ModuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_mark_cycle_and_regeneration_list() {
        let (tiers, graph) = setup();
        let files = [path("app/A.php"), path("app/B.php")];
        graph.create("billing", "Billing", "", &files).await.unwrap();
        assert!(graph.modules_needing_regeneration().await.unwrap().is_empty());

        tiers
            .write_atomic(&files[1], TierWrite::new(None).with(Tier::Standard, "standard"))
            .await
            .unwrap();
        assert_eq!(graph.modules_needing_regeneration().await.unwrap(), vec!["billing"]);

        assert_eq!(graph.mark_documented("billing", &files).await.unwrap(), 2);
        assert!(graph.modules_needing_regeneration().await.unwrap().is_empty());

        assert!(graph.mark_undocumented("billing", &files[0]).await.unwrap());
        assert!(!graph.mark_undocumented("billing", &files[0]).await.unwrap());
        let module = graph.load("billing").await.unwrap().unwrap();
        assert_eq!(module.undocumented_files, vec![files[0].clone()]);
        assert_eq!(module.statistics.documented, 1);

        assert_eq!(graph.remove_files("billing", &files).await.unwrap(), 2);
        assert_eq!(graph.load("billing").await.unwrap().unwrap().statistics.total, 0);
    }
}
