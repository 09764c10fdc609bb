//! Module records

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{IntegrityError, RevisionId, SourcePath, TierLabel};

static SLUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("SLUG is a valid regex pattern")
});

pub fn validate_slug(slug: &str) -> Result<(), IntegrityError> {
    if slug.len() > 64 || !SLUG.is_match(slug) {
        return Err(IntegrityError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentedFile {
    pub path: SourcePath,
    pub tier: TierLabel,
    pub added_at: DateTime<Utc>,
}

/// Always derived from the file lists on save
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStats {
    pub total: usize,
    pub documented: usize,
    pub undocumented: usize,
}

/// A named grouping of source files sharing one narrative document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub slug: String,
    pub name: String,
    pub summary: String,
    #[serde(default)]
    pub documented_files: Vec<DocumentedFile>,
    #[serde(default)]
    pub undocumented_files: Vec<SourcePath>,
    #[serde(default)]
    pub last_synced_revision: Option<RevisionId>,
    #[serde(default)]
    pub statistics: ModuleStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Module {
    pub fn new(slug: impl Into<String>, name: impl Into<String>, summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            slug: slug.into(),
            name: name.into(),
            summary: summary.into(),
            documented_files: Vec::new(),
            undocumented_files: Vec::new(),
            last_synced_revision: None,
            statistics: ModuleStats::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn contains(&self, path: &SourcePath) -> bool {
        self.is_documented(path) || self.undocumented_files.contains(path)
    }

    pub fn is_documented(&self, path: &SourcePath) -> bool {
        self.documented_files.iter().any(|f| &f.path == path)
    }

    /// Every path in either list, sorted
    pub fn all_paths(&self) -> Vec<SourcePath> {
        let set: BTreeSet<SourcePath> = self
            .documented_files
            .iter()
            .map(|f| f.path.clone())
            .chain(self.undocumented_files.iter().cloned())
            .collect();
        set.into_iter().collect()
    }

    pub fn recompute_stats(&mut self) {
        self.statistics = ModuleStats {
            total: self.documented_files.len() + self.undocumented_files.len(),
            documented: self.documented_files.len(),
            undocumented: self.undocumented_files.len(),
        };
    }
}
