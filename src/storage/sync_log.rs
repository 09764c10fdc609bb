//! Sync log
//!
//! Persisted map from source path to the revision its artifacts reflect,
//! plus the run baseline and per-module regeneration revisions. The whole
//! document is held in memory and rewritten on every mutation, inside the
//! same lock, so concurrent units never lose each other's updates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::file_store::SharedFileStore;
use super::{read_json, write_json};
use crate::types::{Result, RevisionId, SourcePath};
use crate::vcs::RevisionOracle;

const FILE_NAME: &str = "sync-log.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub revision: RevisionId,
    pub last_updated: DateTime<Utc>,
}

/// On-disk shape of the sync log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncLogRecord {
    pub last_update_revision: Option<RevisionId>,
    pub last_update_timestamp: Option<DateTime<Utc>>,
    pub files: BTreeMap<SourcePath, SyncLogEntry>,
    pub modules: BTreeMap<String, SyncLogEntry>,
}

pub struct SyncLog {
    files: SharedFileStore,
    path: PathBuf,
    state: Mutex<SyncLogRecord>,
}

impl SyncLog {
    /// Load from `{state_dir}/sync-log.json`; a missing file is an empty log
    pub async fn load(files: SharedFileStore, state_dir: &Path) -> Result<Self> {
        let path = state_dir.join(FILE_NAME);
        let record = read_json(files.as_ref(), &path).await?.unwrap_or_default();
        Ok(Self {
            files,
            path,
            state: Mutex::new(record),
        })
    }

    /// Apply `f` to a copy, persist it, then commit it in memory
    async fn mutate<R>(&self, f: impl FnOnce(&mut SyncLogRecord) -> R) -> Result<R> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let out = f(&mut next);
        write_json(self.files.as_ref(), &self.path, &next).await?;
        *state = next;
        Ok(out)
    }

    pub async fn get(&self, path: &SourcePath) -> Option<SyncLogEntry> {
        self.state.lock().await.files.get(path).cloned()
    }

    pub async fn set(
        &self,
        path: &SourcePath,
        revision: &RevisionId,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        debug!(path = %path, revision = %revision.short(), "Recording sync");
        self.mutate(|log| {
            log.files.insert(
                path.clone(),
                SyncLogEntry {
                    revision: revision.clone(),
                    last_updated: timestamp,
                },
            );
        })
        .await
    }

    /// Returns whether an entry existed
    pub async fn remove(&self, path: &SourcePath) -> Result<bool> {
        if !self.state.lock().await.files.contains_key(path) {
            return Ok(false);
        }
        self.mutate(|log| log.files.remove(path).is_some()).await
    }

    /// Whether `path` must be re-synced at `current`.
    ///
    /// True when there is no entry, or when the last revision touching the
    /// path differs from the recorded one and is not contained in it.
    pub async fn needs_sync(
        &self,
        path: &SourcePath,
        current: &RevisionId,
        oracle: &RevisionOracle,
    ) -> Result<bool> {
        let Some(entry) = self.get(path).await else {
            return Ok(true);
        };
        let Some(last) = oracle.last_revision_touching(path, current).await? else {
            return Ok(false);
        };
        if last == entry.revision {
            return Ok(false);
        }
        Ok(!oracle.is_ancestor(&last, &entry.revision).await?)
    }

    /// Baseline revision of the last complete run
    pub async fn baseline(&self) -> Option<RevisionId> {
        self.state.lock().await.last_update_revision.clone()
    }

    pub async fn advance(&self, revision: &RevisionId, timestamp: DateTime<Utc>) -> Result<()> {
        self.mutate(|log| {
            log.last_update_revision = Some(revision.clone());
            log.last_update_timestamp = Some(timestamp);
        })
        .await
    }

    pub async fn module_entry(&self, slug: &str) -> Option<SyncLogEntry> {
        self.state.lock().await.modules.get(slug).cloned()
    }

    pub async fn set_module(
        &self,
        slug: &str,
        revision: &RevisionId,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.mutate(|log| {
            log.modules.insert(
                slug.to_string(),
                SyncLogEntry {
                    revision: revision.clone(),
                    last_updated: timestamp,
                },
            );
        })
        .await
    }

    /// Every tracked source path, sorted
    pub async fn paths(&self) -> Vec<SourcePath> {
        self.state.lock().await.files.keys().cloned().collect()
    }

    pub async fn snapshot(&self) -> SyncLogRecord {
        self.state.lock().await.clone()
    }
}
