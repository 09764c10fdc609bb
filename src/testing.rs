//! In-memory collaborators for tests
//!
//! `MemoryVcs` models a linear commit history; `ScriptedGenerator` returns
//! queued responses per path and records every call it receives.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ai::{
    AssignmentRequest, Generator, ModuleDocRequest, TierContent, TierRequest, TierUpdate,
    UpdateRequest,
};
use crate::modules::Recommendation;
use crate::types::{ErrorClassifier, LlmError, Result, RevisionId, SourcePath, SyncError};
use crate::vcs::{ChangeStatus, PathChange, VersionControl};

// =============================================================================
// MemoryVcs
// =============================================================================

struct Commit {
    id: RevisionId,
    tree: BTreeMap<String, String>,
    touched: BTreeSet<String>,
}

#[derive(Default)]
struct History {
    commits: Vec<Commit>,
    blank_diffs: BTreeSet<String>,
    failing: BTreeSet<String>,
}

impl History {
    fn index_of(&self, rev: &RevisionId) -> Result<usize> {
        self.commits
            .iter()
            .position(|c| &c.id == rev)
            .ok_or_else(|| SyncError::revision("memory", format!("unknown revision {}", rev)))
    }

    fn check(&self, path: &str) -> Result<()> {
        if self.failing.contains(path) {
            return Err(SyncError::revision("memory", format!("injected failure for {}", path)));
        }
        Ok(())
    }
}

/// Linear in-memory history
#[derive(Default)]
pub struct MemoryVcs {
    history: Mutex<History>,
}

impl MemoryVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply changes on top of HEAD (`None` deletes) and return the new revision
    pub fn commit(&self, changes: &[(&str, Option<&str>)]) -> RevisionId {
        let mut history = self.history.lock().unwrap();
        let mut tree = history
            .commits
            .last()
            .map(|c| c.tree.clone())
            .unwrap_or_default();
        let mut touched = BTreeSet::new();
        for (path, content) in changes {
            match content {
                Some(c) => {
                    tree.insert(path.to_string(), c.to_string());
                }
                None => {
                    tree.remove(*path);
                }
            }
            touched.insert(path.to_string());
        }
        let id = RevisionId::new(format!("{:040x}", history.commits.len() + 1));
        history.commits.push(Commit {
            id: id.clone(),
            tree,
            touched,
        });
        id
    }

    /// Diffs for `path` come back empty
    pub fn blank_diff(&self, path: &str) {
        self.history.lock().unwrap().blank_diffs.insert(path.to_string());
    }

    /// Reads and diffs of `path` fail with a revision error
    pub fn fail_path(&self, path: &str) {
        self.history.lock().unwrap().failing.insert(path.to_string());
    }

    pub fn head(&self) -> RevisionId {
        self.history.lock().unwrap().commits.last().unwrap().id.clone()
    }
}

#[async_trait]
impl VersionControl for MemoryVcs {
    async fn resolve(&self, rev: &str) -> Result<RevisionId> {
        let history = self.history.lock().unwrap();
        let found = if rev == "HEAD" {
            history.commits.last()
        } else {
            history.commits.iter().find(|c| c.id.as_str().starts_with(rev))
        };
        found
            .map(|c| c.id.clone())
            .ok_or_else(|| SyncError::revision("memory", format!("cannot resolve {}", rev)))
    }

    async fn changed_paths(&self, from: &RevisionId, to: &RevisionId) -> Result<Vec<PathChange>> {
        let history = self.history.lock().unwrap();
        let a = &history.commits[history.index_of(from)?].tree;
        let b = &history.commits[history.index_of(to)?].tree;

        let mut out = Vec::new();
        for (path, content) in b {
            match a.get(path) {
                None => out.push(PathChange {
                    path: path.clone(),
                    status: ChangeStatus::Added,
                }),
                Some(old) if old != content => out.push(PathChange {
                    path: path.clone(),
                    status: ChangeStatus::Modified,
                }),
                Some(_) => {}
            }
        }
        for path in a.keys().filter(|p| !b.contains_key(*p)) {
            out.push(PathChange {
                path: path.clone(),
                status: ChangeStatus::Deleted,
            });
        }
        Ok(out)
    }

    async fn diff(
        &self,
        path: &SourcePath,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<String> {
        let history = self.history.lock().unwrap();
        history.check(path.as_str())?;
        if history.blank_diffs.contains(path.as_str()) {
            return Ok(String::new());
        }
        let old = history.commits[history.index_of(from)?].tree.get(path.as_str());
        let new = history.commits[history.index_of(to)?].tree.get(path.as_str());
        Ok(match (old, new) {
            (Some(o), Some(n)) if o != n => {
                format!("--- a/{path}\n+++ b/{path}\n-{o}\n+{n}\n")
            }
            _ => String::new(),
        })
    }

    async fn show(&self, path: &SourcePath, rev: &RevisionId) -> Result<Option<String>> {
        let history = self.history.lock().unwrap();
        history.check(path.as_str())?;
        let idx = history.index_of(rev)?;
        Ok(history.commits[idx].tree.get(path.as_str()).cloned())
    }

    async fn last_touching(
        &self,
        path: &SourcePath,
        rev: &RevisionId,
    ) -> Result<Option<RevisionId>> {
        let history = self.history.lock().unwrap();
        let idx = history.index_of(rev)?;
        Ok(history.commits[..=idx]
            .iter()
            .rev()
            .find(|c| c.touched.contains(path.as_str()))
            .map(|c| c.id.clone()))
    }

    async fn is_ancestor(&self, ancestor: &RevisionId, descendant: &RevisionId) -> Result<bool> {
        let history = self.history.lock().unwrap();
        Ok(history.index_of(ancestor)? <= history.index_of(descendant)?)
    }

    async fn list_files(&self, rev: &RevisionId) -> Result<Vec<String>> {
        let history = self.history.lock().unwrap();
        let idx = history.index_of(rev)?;
        Ok(history.commits[idx].tree.keys().cloned().collect())
    }
}

// =============================================================================
// ScriptedGenerator
// =============================================================================

/// Scripted response for one generator call
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Reply(T),
    RateLimited,
    ContextTooLong,
}

impl<T> Scripted<T> {
    fn resolve(self) -> Result<T> {
        match self {
            Scripted::Reply(value) => Ok(value),
            Scripted::RateLimited => Err(LlmError::rate_limited("429 too many requests").into()),
            Scripted::ContextTooLong => Err(ErrorClassifier::classify(
                "maximum context length exceeded",
                "scripted",
            )
            .into()),
        }
    }
}

fn paragraph(subject: &str, repeat: usize) -> String {
    format!(
        "{} is documented here in full detail for readers of the codebase. ",
        subject
    )
    .repeat(repeat)
}

/// Every call the generator received, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratorCall {
    Generate(String),
    Update(String),
    Module(String),
    Assign(Vec<String>),
}

/// Generator with per-item response queues; unscripted items get valid defaults
#[derive(Default)]
pub struct ScriptedGenerator {
    tiers: Mutex<HashMap<String, VecDeque<Scripted<TierContent>>>>,
    updates: Mutex<HashMap<String, VecDeque<Scripted<TierUpdate>>>>,
    modules: Mutex<HashMap<String, VecDeque<Scripted<String>>>>,
    recommendations: Mutex<Vec<Recommendation>>,
    calls: Mutex<Vec<GeneratorCall>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_tiers(&self, path: &str, reply: Scripted<TierContent>) {
        self.tiers
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn script_update(&self, path: &str, reply: Scripted<TierUpdate>) {
        self.updates
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn script_module(&self, slug: &str, reply: Scripted<String>) {
        self.modules
            .lock()
            .unwrap()
            .entry(slug.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn set_recommendations(&self, recs: Vec<Recommendation>) {
        *self.recommendations.lock().unwrap() = recs;
    }

    pub fn calls(&self) -> Vec<GeneratorCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Valid three-tier content for `path`
    pub fn default_tiers(path: &str) -> TierContent {
        TierContent {
            micro: format!("{} provides one focused behavior.", path),
            standard: paragraph(path, 2),
            expansive: format!("# {}\n\n{}", path, paragraph(path, 5)),
        }
    }

    fn record(&self, call: GeneratorCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_tiers(&self, request: TierRequest) -> Result<TierContent> {
        let key = request.path.to_string();
        self.record(GeneratorCall::Generate(key.clone()));
        let next = self
            .tiers
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front());
        match next {
            Some(scripted) => scripted.resolve(),
            None => Ok(Self::default_tiers(&key)),
        }
    }

    async fn update_tiers(&self, request: UpdateRequest) -> Result<TierUpdate> {
        let key = request.path.to_string();
        self.record(GeneratorCall::Update(key.clone()));
        let next = self
            .updates
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front());
        match next {
            Some(scripted) => scripted.resolve(),
            None => Ok(TierUpdate {
                micro: Some(format!("{} provides one updated behavior.", key)),
                standard: None,
                expansive: Some(format!("# {}\n\nUpdated. {}", key, paragraph(&key, 5))),
            }),
        }
    }

    async fn regenerate_module_document(&self, request: ModuleDocRequest) -> Result<String> {
        let slug = request.slug.clone();
        self.record(GeneratorCall::Module(slug.clone()));
        let next = self
            .modules
            .lock()
            .unwrap()
            .get_mut(&slug)
            .and_then(|q| q.pop_front());
        match next {
            Some(scripted) => scripted.resolve(),
            None => {
                let files: Vec<String> =
                    request.new_files.iter().map(|f| f.path.to_string()).collect();
                Ok(format!(
                    "## Overview\n\n{} groups {}. {}\n\n## Files\n\n{}\n",
                    request.module_name,
                    files.join(", "),
                    paragraph(&request.module_name, 3),
                    files.join("\n")
                ))
            }
        }
    }

    async fn suggest_assignments(&self, request: AssignmentRequest) -> Result<Vec<Recommendation>> {
        self.record(GeneratorCall::Assign(
            request.files.iter().map(|f| f.path.to_string()).collect(),
        ));
        Ok(self.recommendations.lock().unwrap().clone())
    }
}
