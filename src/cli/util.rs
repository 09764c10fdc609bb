//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::ai::{
    LlmGenerator, ProviderConfig, SharedGenerator, SizeBasedEffort, TimeoutConfig, create_provider,
};
use crate::config::{Config, ConfigLoader};
use crate::modules::{AssignmentIndex, ModuleGraph};
use crate::storage::{LocalFileStore, SharedFileStore, SyncLog, TierStore};
use crate::sync::{ChangeClassifier, SyncOrchestrator, SyncStatus};
use crate::types::{Result, SourcePath, SyncError};
use crate::vcs::{GitCli, RevisionOracle, SharedVcs, SourceFilter};

/// Command execution context
///
/// Created via `CommandContext::load()` once the project is initialized.
pub struct CommandContext {
    /// Project root directory
    pub project_root: PathBuf,
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Store rooted at the project root
    pub files: SharedFileStore,
}

impl CommandContext {
    /// Validate initialization and load config for the current directory
    pub fn load() -> Result<Self> {
        let project_root = std::env::current_dir()?;
        Self::load_at(&project_root)
    }

    pub fn load_at(root: &Path) -> Result<Self> {
        require_initialized(root)?;
        let config = ConfigLoader::load(root)?;
        config.validate()?;
        Ok(Self {
            project_root: root.to_path_buf(),
            config: Arc::new(config),
            files: Arc::new(LocalFileStore::new(root)),
        })
    }

    pub fn tiers(&self) -> Arc<TierStore> {
        Arc::new(TierStore::new(self.files.clone(), &self.config.docs))
    }

    /// Module graph without any generator wiring
    pub fn graph(&self) -> ModuleGraph {
        ModuleGraph::new(self.files.clone(), self.tiers(), &self.config)
    }

    pub async fn assignments(&self) -> Result<AssignmentIndex> {
        AssignmentIndex::load(self.files.clone(), &self.config.docs.state_dir).await
    }

    /// Generator backed by the configured provider
    pub fn generator(&self) -> Result<SharedGenerator> {
        let provider = create_provider(&ProviderConfig::from(&self.config.llm))?;
        Ok(Arc::new(LlmGenerator::new(
            provider,
            Arc::new(SizeBasedEffort::default()),
            self.config.generation.max_source_chars,
        )))
    }

    pub fn vcs(&self) -> SharedVcs {
        let timeouts = TimeoutConfig::from_config(&self.config);
        Arc::new(GitCli::new(&self.project_root, timeouts.vcs))
    }

    /// Fully wired orchestrator over git and the configured provider
    pub async fn orchestrator(&self) -> Result<SyncOrchestrator> {
        SyncOrchestrator::open(
            self.config.clone(),
            self.files.clone(),
            self.vcs(),
            self.generator()?,
        )
        .await
    }

    /// Pending work; needs no generator
    pub async fn status(&self) -> Result<SyncStatus> {
        let oracle = RevisionOracle::new(self.vcs(), SourceFilter::new(&self.config.sources)?);
        let sync_log = Arc::new(SyncLog::load(self.files.clone(), &self.config.docs.state_dir).await?);
        let graph = Arc::new(self.graph());
        let assignments = Arc::new(self.assignments().await?);
        let classifier = ChangeClassifier::new(
            oracle.clone(),
            sync_log.clone(),
            graph.clone(),
            assignments.clone(),
        );
        SyncStatus::collect(&oracle, &classifier, &sync_log, &graph, &assignments).await
    }
}

/// Require the project state directory to exist under `root`
pub fn require_initialized(root: &Path) -> Result<()> {
    if !ConfigLoader::is_project_initialized(root) {
        return Err(SyncError::NotInitialized);
    }
    Ok(())
}

/// Normalize user-supplied paths
pub fn parse_paths(raw: &[String]) -> Result<Vec<SourcePath>> {
    raw.iter()
        .map(|p| SourcePath::new(p).map_err(SyncError::from))
        .collect()
}
