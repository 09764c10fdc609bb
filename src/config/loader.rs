//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config ($XDG_CONFIG_HOME/docsync/config.toml)
//! 3. Project config (.docsync/config.toml under the project root)
//! 4. Environment variables (DOCSYNC_<SECTION>__<KEY>)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::{debug, info};

use super::types::Config;
use crate::types::{Result, SyncError};

const APP_DIR: &str = "docsync";
const ENV_PREFIX: &str = "DOCSYNC_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a project rooted at `root`:
    /// defaults → global → project → env vars
    pub fn load(root: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path(root);
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // DOCSYNC_SYNC__RETRY_COUNT -> sync.retry_count
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| SyncError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| SyncError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Global config directory (~/.config/docsync/)
    pub fn global_dir() -> Option<PathBuf> {
        BaseDirs::new().map(|dirs| dirs.config_dir().join(APP_DIR))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path(root: &Path) -> PathBuf {
        Self::project_dir(root).join("config.toml")
    }

    /// Default state directory; the sync log and assignment index live here
    pub fn project_dir(root: &Path) -> PathBuf {
        root.join(".docsync")
    }

    pub fn is_project_initialized(root: &Path) -> bool {
        Self::project_config_path(root).exists()
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Render the effective configuration
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| SyncError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the project state directory and a default config file.
    /// Returns the config path and whether it was newly written.
    pub fn init_project(root: &Path, force: bool) -> Result<(PathBuf, bool)> {
        let project_dir = Self::project_dir(root);
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if config_path.exists() && !force {
            info!("Project config exists: {}", config_path.display());
            return Ok((config_path, false));
        }

        fs::write(&config_path, Self::default_project_config())?;
        info!("Created project config: {}", config_path.display());
        Ok((config_path, true))
    }

    /// Default project config content (TOML)
    fn default_project_config() -> String {
        r#"# docsync project configuration
# Overrides ~/.config/docsync/config.toml; DOCSYNC_<SECTION>__<KEY> overrides both.

version = "1.0"

[sources]
roots = ["src", "app"]
exclude = ["**/tests/**", "**/test/**", "**/*_test.*", "**/*Test.*", "**/*.spec.*", "**/*.test.*"]

[docs]
tier_root = "docs/files"
modules_dir = "docs/modules"

[docs.tiers]
micro = "short"
standard = "medium"
expansive = "full"

[assignment]
enabled = true
confidence_threshold = 0.7
min_files_per_module = 2

[sync]
concurrency = 4
retry_count = 3
rate_limit_backoff_secs = 30

[llm]
provider = "claude-code"
model = "claude-sonnet-4-20250514"
timeout_secs = 300
"#
        .to_string()
    }
}
