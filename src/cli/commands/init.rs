//! Init Command
//!
//! Initialize docsync in the current directory.

use crate::cli::Output;
use crate::config::ConfigLoader;
use crate::types::{Result, SyncError};

pub fn run(force: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let out = Output::new();

    if ConfigLoader::is_project_initialized(&root) && !force {
        return Err(SyncError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    let (config_path, _) = ConfigLoader::init_project(&root, force)?;
    let config = ConfigLoader::load(&root)?;

    out.success("Initialized docsync");
    out.field("Config", config_path.display());
    out.field("Tier docs", config.docs.tier_root.display());
    out.field("Modules", config.docs.modules_dir.display());
    out.field("Provider", &config.llm.provider);
    println!();
    println!("Next steps:");
    println!("  1. Adjust [sources] roots in {}", config_path.display());
    println!("  2. Run 'docsync sync' to document every tracked source file");

    Ok(())
}
