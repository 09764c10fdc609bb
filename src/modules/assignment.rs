//! Assignment index
//!
//! Global view of which documented files belong to a module, which are
//! unassigned, and which are permanently excluded. The index is derived
//! from the module graph and the documented set, and persisted at
//! `{state_dir}/assignments.json`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::graph::ModuleGraph;
use crate::storage::{SharedFileStore, read_json, write_json};
use crate::types::{Result, SourcePath};

const FILE_NAME: &str = "assignments.json";

/// Generator suggestion placing files into an existing or new module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub module_slug: String,
    /// Display name when the module does not exist yet
    #[serde(default)]
    pub module_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub files: Vec<SourcePath>,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

/// Split recommendations into those to apply and those only recorded
pub fn partition_by_confidence(
    recommendations: Vec<Recommendation>,
    threshold: f64,
) -> (Vec<Recommendation>, Vec<Recommendation>) {
    recommendations
        .into_iter()
        .partition(|r| r.confidence >= threshold)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentRecord {
    pub assigned: BTreeMap<String, Vec<SourcePath>>,
    pub unassigned: Vec<SourcePath>,
    pub do_not_document: Vec<SourcePath>,
    pub last_analysis: Option<DateTime<Utc>>,
    /// Recommendations below the confidence threshold, kept for review
    pub low_confidence: Vec<Recommendation>,
}

impl AssignmentRecord {
    /// Derive a clean partition. Modules are visited in slug order and the
    /// first owner wins; excluded paths are never assigned or unassigned.
    pub fn derive(
        modules: &[(String, Vec<SourcePath>)],
        documented: &[SourcePath],
        do_not_document: Vec<SourcePath>,
    ) -> Self {
        let excluded: BTreeSet<&SourcePath> = do_not_document.iter().collect();
        let mut seen: BTreeSet<SourcePath> = BTreeSet::new();
        let mut assigned: BTreeMap<String, Vec<SourcePath>> = BTreeMap::new();

        let mut ordered: Vec<&(String, Vec<SourcePath>)> = modules.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));
        for (slug, paths) in ordered {
            let owned = assigned.entry(slug.clone()).or_default();
            for path in paths {
                if excluded.contains(path) || !seen.insert(path.clone()) {
                    continue;
                }
                owned.push(path.clone());
            }
            owned.sort();
        }

        let unassigned: Vec<SourcePath> = documented
            .iter()
            .filter(|p| !excluded.contains(p) && !seen.contains(*p))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut do_not_document = do_not_document;
        do_not_document.sort();
        do_not_document.dedup();

        Self {
            assigned,
            unassigned,
            do_not_document,
            last_analysis: None,
            low_confidence: Vec::new(),
        }
    }
}

pub struct AssignmentIndex {
    files: SharedFileStore,
    path: PathBuf,
    state: Mutex<AssignmentRecord>,
}

impl AssignmentIndex {
    pub async fn load(files: SharedFileStore, state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(FILE_NAME);
        let record = read_json(files.as_ref(), &path).await?.unwrap_or_default();
        Ok(Self {
            files,
            path,
            state: Mutex::new(record),
        })
    }

    /// Apply `f` and persist; an unchanged record is not rewritten
    async fn mutate<R>(&self, f: impl FnOnce(&mut AssignmentRecord) -> R) -> Result<R> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next);
        if next != *state {
            write_json(self.files.as_ref(), &self.path, &next).await?;
            *state = next;
        }
        Ok(out)
    }

    pub async fn snapshot(&self) -> AssignmentRecord {
        self.state.lock().await.clone()
    }

    pub async fn is_excluded(&self, path: &SourcePath) -> bool {
        self.state.lock().await.do_not_document.contains(path)
    }

    pub async fn excluded(&self) -> BTreeSet<SourcePath> {
        self.state.lock().await.do_not_document.iter().cloned().collect()
    }

    /// Add to `do_not_document`, removing it from the other sets.
    /// Returns false if it was already excluded.
    pub async fn exclude(&self, path: &SourcePath) -> Result<bool> {
        if self.is_excluded(path).await {
            return Ok(false);
        }
        self.mutate(|record| {
            record.unassigned.retain(|p| p != path);
            for paths in record.assigned.values_mut() {
                paths.retain(|p| p != path);
            }
            record.do_not_document.push(path.clone());
            record.do_not_document.sort();
        })
        .await?;
        info!(path = %path, "Excluded from documentation");
        Ok(true)
    }

    /// Remove from `do_not_document`; the next rebuild places it again
    pub async fn include(&self, path: &SourcePath) -> Result<bool> {
        if !self.is_excluded(path).await {
            return Ok(false);
        }
        self.mutate(|record| record.do_not_document.retain(|p| p != path))
            .await?;
        Ok(true)
    }

    /// Rebuild the partition from the module graph and the documented set
    pub async fn rebuild(
        &self,
        graph: &ModuleGraph,
        documented: &[SourcePath],
    ) -> Result<AssignmentRecord> {
        let modules: Vec<(String, Vec<SourcePath>)> = graph
            .all_modules()
            .await?
            .into_iter()
            .map(|m| {
                let paths = m.all_paths();
                (m.slug, paths)
            })
            .collect();

        let record = self
            .mutate(|record| {
                let mut next = AssignmentRecord::derive(
                    &modules,
                    documented,
                    std::mem::take(&mut record.do_not_document),
                );
                next.last_analysis = record.last_analysis;
                next.low_confidence = std::mem::take(&mut record.low_confidence);
                *record = next;
                record.clone()
            })
            .await?;
        debug!(
            modules = record.assigned.len(),
            unassigned = record.unassigned.len(),
            excluded = record.do_not_document.len(),
            "Rebuilt assignment index"
        );
        Ok(record)
    }

    /// Record an analysis pass and the recommendations it did not apply
    pub async fn record_analysis(
        &self,
        low_confidence: Vec<Recommendation>,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(|record| {
            record.last_analysis = Some(at);
            record.low_confidence = low_confidence;
        })
        .await
    }
}
