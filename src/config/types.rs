//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! A single `Config` is built once and handed to every component.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{assignment, generation, network, sync};
use crate::types::{Result, SyncError, Tier};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Which source files are documented
    pub sources: SourcesConfig,

    /// Where artifacts and bookkeeping documents live
    pub docs: DocsConfig,

    /// Generator response acceptance rules
    pub generation: GenerationConfig,

    /// Automatic module assignment
    pub assignment: AssignmentConfig,

    /// Scheduling, retry and timeout policy
    pub sync: SyncConfig,

    /// LLM provider settings
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            sources: SourcesConfig::default(),
            docs: DocsConfig::default(),
            generation: GenerationConfig::default(),
            assignment: AssignmentConfig::default(),
            sync: SyncConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `SyncError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.assignment.confidence_threshold) {
            return Err(SyncError::Config(format!(
                "assignment.confidence_threshold must be between 0.0 and 1.0, got {}",
                self.assignment.confidence_threshold
            )));
        }

        if self.assignment.min_files_per_module == 0 {
            return Err(SyncError::Config(
                "assignment.min_files_per_module must be greater than 0".to_string(),
            ));
        }

        if self.sync.concurrency == 0 {
            return Err(SyncError::Config(
                "sync.concurrency must be greater than 0".to_string(),
            ));
        }

        if self.sync.unit_timeout_secs == 0 || self.sync.vcs_timeout_secs == 0 {
            return Err(SyncError::Config(
                "sync timeouts must be greater than 0".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(SyncError::Config(
                "llm.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(SyncError::Config(format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        let dirs = Tier::ALL.map(|t| self.docs.tiers.dir(t));
        if dirs.iter().any(|d| d.trim().is_empty()) {
            return Err(SyncError::Config(
                "docs.tiers directories must not be empty".to_string(),
            ));
        }
        if dirs[0] == dirs[1] || dirs[1] == dirs[2] || dirs[0] == dirs[2] {
            return Err(SyncError::Config(
                "docs.tiers directories must be distinct".to_string(),
            ));
        }

        if self.sources.extensions.is_empty() {
            return Err(SyncError::Config(
                "sources.extensions must list at least one extension".to_string(),
            ));
        }

        for pattern in &self.sources.exclude {
            glob::Pattern::new(pattern).map_err(|e| {
                SyncError::Config(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}

// =============================================================================
// Sources
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Directories (repository-relative) whose files are documented.
    /// Empty means the whole repository.
    pub roots: Vec<String>,

    /// File-type allowlist (extensions without the dot)
    pub extensions: Vec<String>,

    /// Glob patterns for paths that are never documented (tests)
    pub exclude: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            roots: vec!["src".to_string(), "app".to_string()],
            extensions: ["rs", "php", "ts", "tsx", "js", "py", "go", "java", "rb", "kt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            exclude: vec![
                "**/tests/**".to_string(),
                "**/test/**".to_string(),
                "**/*_test.*".to_string(),
                "**/*Test.*".to_string(),
                "**/*.spec.*".to_string(),
                "**/*.test.*".to_string(),
            ],
        }
    }
}

// =============================================================================
// Documentation layout
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocsConfig {
    /// Root of the per-file tier directories
    pub tier_root: PathBuf,

    /// Tier-name-to-directory map
    pub tiers: TierDirs,

    /// Module metadata records and narrative documents
    pub modules_dir: PathBuf,

    /// Sync log and assignment index
    pub state_dir: PathBuf,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            tier_root: PathBuf::from("docs/files"),
            tiers: TierDirs::default(),
            modules_dir: PathBuf::from("docs/modules"),
            state_dir: PathBuf::from(".docsync"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierDirs {
    pub micro: String,
    pub standard: String,
    pub expansive: String,
}

impl TierDirs {
    pub fn dir(&self, tier: Tier) -> &str {
        match tier {
            Tier::Micro => &self.micro,
            Tier::Standard => &self.standard,
            Tier::Expansive => &self.expansive,
        }
    }
}

impl Default for TierDirs {
    fn default() -> Self {
        Self {
            micro: "short".to_string(),
            standard: "medium".to_string(),
            expansive: "full".to_string(),
        }
    }
}

// =============================================================================
// Generation
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Substrings that mark a response as an unfilled template
    pub placeholder_markers: Vec<String>,

    /// Minimum accepted lengths
    pub min_length: MinLengths,

    /// Source text beyond this many characters is truncated in prompts
    pub max_source_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            placeholder_markers: vec![
                "[PLACEHOLDER]".to_string(),
                "TODO: describe".to_string(),
                "Lorem ipsum".to_string(),
                "{{".to_string(),
                "[Insert".to_string(),
                "<description>".to_string(),
            ],
            min_length: MinLengths::default(),
            max_source_chars: generation::MAX_SOURCE_CHARS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinLengths {
    pub micro: usize,
    pub standard: usize,
    pub expansive: usize,
    pub module: usize,
}

impl MinLengths {
    pub fn for_tier(&self, tier: Tier) -> usize {
        match tier {
            Tier::Micro => self.micro,
            Tier::Standard => self.standard,
            Tier::Expansive => self.expansive,
        }
    }
}

impl Default for MinLengths {
    fn default() -> Self {
        Self {
            micro: generation::MIN_MICRO_CHARS,
            standard: generation::MIN_STANDARD_CHARS,
            expansive: generation::MIN_EXPANSIVE_CHARS,
            module: generation::MIN_MODULE_CHARS,
        }
    }
}

// =============================================================================
// Assignment
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentConfig {
    /// Ask the generator to place unassigned files into modules
    pub enabled: bool,

    /// Recommendations below this confidence are recorded, not applied
    pub confidence_threshold: f64,

    /// Smallest file list for a module suggestion to be acted on
    pub min_files_per_module: usize,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confidence_threshold: assignment::DEFAULT_CONFIDENCE_THRESHOLD,
            min_files_per_module: assignment::DEFAULT_MIN_FILES_PER_MODULE,
        }
    }
}

// =============================================================================
// Sync policy
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Units processed in parallel
    pub concurrency: usize,

    /// Extra attempts for a transiently failing unit
    pub retry_count: u32,

    /// Delay before a rate-limited unit is retried
    pub rate_limit_backoff_secs: u64,

    /// Wall-clock budget for one unit
    pub unit_timeout_secs: u64,

    /// Timeout for one version-control subprocess
    pub vcs_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: sync::DEFAULT_CONCURRENCY,
            retry_count: sync::DEFAULT_RETRY_COUNT,
            rate_limit_backoff_secs: sync::DEFAULT_RATE_LIMIT_BACKOFF_SECS,
            unit_timeout_secs: sync::DEFAULT_UNIT_TIMEOUT_SECS,
            vcs_timeout_secs: sync::DEFAULT_VCS_TIMEOUT_SECS,
        }
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("claude-code" or "openai")
    pub provider: String,

    /// Model name
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Temperature for LLM generation (0.0 = deterministic)
    pub temperature: f32,

    /// API base URL for HTTP providers
    pub api_base: Option<String>,

    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "claude-code".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            timeout_secs: network::DEFAULT_TIMEOUT_SECS,
            temperature: 0.0,
            api_base: None,
            max_tokens: 8192,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.docs.tiers.dir(Tier::Micro), "short");
        assert_eq!(config.docs.tiers.dir(Tier::Standard), "medium");
        assert_eq!(config.docs.tiers.dir(Tier::Expansive), "full");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_out_of_range() {
        let mut config = Config::default();
        config.assignment.confidence_threshold = 1.5;
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_duplicate_tier_dirs_rejected() {
        let mut config = Config::default();
        config.docs.tiers.expansive = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_exclude_pattern_rejected() {
        let mut config = Config::default();
        config.sources.exclude = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }
}
