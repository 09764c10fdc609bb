//! Config Command
//!
//! Usage:
//!   docsync config show [--json]
//!   docsync config path

use crate::cli::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show the merged effective configuration
pub fn show(as_json: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let config = ConfigLoader::load(&root)?;
    println!("{}", ConfigLoader::render(&config, as_json)?);
    Ok(())
}

/// Show configuration file locations
pub fn path() -> Result<()> {
    let root = std::env::current_dir()?;
    let out = Output::new();

    out.section("Configuration Files");
    match ConfigLoader::global_config_path() {
        Some(global) => out.field(
            "Global",
            format!("{} ({})", global.display(), exists_label(global.exists())),
        ),
        None => out.field("Global", "unavailable"),
    }
    let project = ConfigLoader::project_config_path(&root);
    out.field(
        "Project",
        format!("{} ({})", project.display(), exists_label(project.exists())),
    );
    out.field("Environment", "DOCSYNC_<SECTION>__<KEY>");
    Ok(())
}

fn exists_label(exists: bool) -> &'static str {
    if exists { "exists" } else { "not found" }
}
