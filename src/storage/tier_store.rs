//! Tiered documentation artifacts
//!
//! A source file maps to up to three artifacts:
//! `{tier_root}/{tier_dir}/{path_without_extension}.md`.
//! Multi-tier writes are all-or-nothing from the caller's view: a failed
//! write restores every artifact the call already touched.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::file_store::SharedFileStore;
use super::marker;
use crate::config::{DocsConfig, TierDirs};
use crate::types::{Result, RevisionId, SourcePath, Tier};

/// Content for one `write_atomic` call
#[derive(Debug, Clone, Default)]
pub struct TierWrite {
    /// Tiers to write; absent tiers are left alone
    pub contents: BTreeMap<Tier, String>,
    /// Source revision the content reflects; stamped into the expansive tier
    pub revision: Option<RevisionId>,
}

impl TierWrite {
    pub fn new(revision: Option<RevisionId>) -> Self {
        Self {
            contents: BTreeMap::new(),
            revision,
        }
    }

    pub fn with(mut self, tier: Tier, content: impl Into<String>) -> Self {
        self.contents.insert(tier, content.into());
        self
    }
}

/// Outcome of a successful `write_atomic`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenSet {
    pub written: Vec<Tier>,
    /// Tiers skipped because the stored bytes were already identical
    pub unchanged: Vec<Tier>,
}

impl WrittenSet {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty()
    }
}

pub struct TierStore {
    files: SharedFileStore,
    root: PathBuf,
    dirs: TierDirs,
}

impl TierStore {
    pub fn new(files: SharedFileStore, docs: &DocsConfig) -> Self {
        Self {
            files,
            root: docs.tier_root.clone(),
            dirs: docs.tiers.clone(),
        }
    }

    pub fn artifact_path(&self, path: &SourcePath, tier: Tier) -> PathBuf {
        self.root
            .join(self.dirs.dir(tier))
            .join(format!("{}.md", path.without_extension()))
    }

    pub async fn exists(&self, path: &SourcePath, tier: Tier) -> Result<bool> {
        self.files.exists(&self.artifact_path(path, tier)).await
    }

    pub async fn exists_all(&self, path: &SourcePath, tiers: &[Tier]) -> Result<bool> {
        for &tier in tiers {
            if !self.exists(path, tier).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn read(&self, path: &SourcePath, tier: Tier) -> Result<Option<String>> {
        self.files.read(&self.artifact_path(path, tier)).await
    }

    /// Content of every tier that exists
    pub async fn read_all(&self, path: &SourcePath) -> Result<BTreeMap<Tier, String>> {
        let mut out = BTreeMap::new();
        for tier in Tier::ALL {
            if let Some(content) = self.read(path, tier).await? {
                out.insert(tier, content);
            }
        }
        Ok(out)
    }

    /// Most detailed tier present, probing expansive first
    pub async fn highest_tier(&self, path: &SourcePath) -> Result<Option<Tier>> {
        for tier in Tier::ALL.into_iter().rev() {
            if self.exists(path, tier).await? {
                return Ok(Some(tier));
            }
        }
        Ok(None)
    }

    /// Revision stamped into the expansive tier
    pub async fn recorded_revision(&self, path: &SourcePath) -> Result<Option<RevisionId>> {
        Ok(self
            .read(path, Tier::Expansive)
            .await?
            .and_then(|content| marker::extract(&content)))
    }

    /// Remove every tier artifact; returns how many existed
    pub async fn delete(&self, path: &SourcePath) -> Result<usize> {
        let mut removed = 0;
        for tier in Tier::ALL {
            if self.files.delete(&self.artifact_path(path, tier)).await? {
                removed += 1;
            }
        }
        debug!(path = %path, removed, "Deleted tier artifacts");
        Ok(removed)
    }

    /// Write the supplied tiers as one unit.
    ///
    /// Byte-identical tiers are skipped. When a revision is given, the
    /// expansive marker is refreshed even if no expansive content was
    /// supplied. On failure every artifact written by this call is
    /// restored (or removed if it did not exist) before the error returns.
    pub async fn write_atomic(&self, path: &SourcePath, write: TierWrite) -> Result<WrittenSet> {
        let TierWrite {
            mut contents,
            revision,
        } = write;

        if let Some(rev) = &revision {
            match contents.remove(&Tier::Expansive) {
                Some(content) => {
                    contents.insert(Tier::Expansive, marker::stamp(&content, rev));
                }
                None => {
                    if let Some(existing) = self.read(path, Tier::Expansive).await? {
                        contents.insert(Tier::Expansive, marker::stamp(&existing, rev));
                    }
                }
            }
        }

        let mut result = WrittenSet::default();
        // (artifact, content before this call)
        let mut touched: Vec<(PathBuf, Option<String>)> = Vec::new();

        for (tier, content) in contents {
            let artifact = self.artifact_path(path, tier);
            let previous = match self.files.read(&artifact).await {
                Ok(previous) => previous,
                Err(e) => {
                    self.rollback(path, touched).await;
                    return Err(e);
                }
            };

            if previous.as_deref() == Some(content.as_str()) {
                result.unchanged.push(tier);
                continue;
            }

            match self.files.write(&artifact, &content).await {
                Ok(()) => {
                    touched.push((artifact, previous));
                    result.written.push(tier);
                }
                Err(e) => {
                    warn!(path = %path, tier = %tier, error = %e, "Tier write failed, rolling back");
                    self.rollback(path, touched).await;
                    return Err(e);
                }
            }
        }

        if !result.written.is_empty() {
            info!(path = %path, tiers = ?result.written, "Wrote tier artifacts");
        }
        Ok(result)
    }

    async fn rollback(&self, path: &SourcePath, touched: Vec<(PathBuf, Option<String>)>) {
        for (artifact, previous) in touched.into_iter().rev() {
            let restored = match &previous {
                Some(content) => self.files.write(&artifact, content).await,
                None => self.files.delete(&artifact).await.map(|_| ()),
            };
            if let Err(e) = restored {
                warn!(
                    path = %path,
                    artifact = %artifact.display(),
                    error = %e,
                    "Rollback of tier artifact failed"
                );
            }
        }
    }
}
