//! Exclude Command
//!
//! Manage the do-not-document list of the assignment index.

use crate::cli::{CommandContext, Output, parse_paths};
use crate::types::Result;

pub async fn add(files: &[String]) -> Result<()> {
    let ctx = CommandContext::load()?;
    let index = ctx.assignments().await?;
    let out = Output::new();

    for path in parse_paths(files)? {
        if index.exclude(&path).await? {
            out.success(&format!("Excluded {}", path));
        } else {
            out.info(&format!("{} is already excluded", path));
        }
    }
    Ok(())
}

pub async fn remove(files: &[String]) -> Result<()> {
    let ctx = CommandContext::load()?;
    let index = ctx.assignments().await?;
    let out = Output::new();

    for path in parse_paths(files)? {
        if index.include(&path).await? {
            out.success(&format!("{} will be documented again on the next sync", path));
        } else {
            out.info(&format!("{} was not excluded", path));
        }
    }
    Ok(())
}

pub async fn list() -> Result<()> {
    let ctx = CommandContext::load()?;
    let excluded = ctx.assignments().await?.excluded().await;
    let out = Output::new();

    if excluded.is_empty() {
        out.info("No excluded files");
        return Ok(());
    }
    out.header("Excluded Files");
    for path in &excluded {
        out.line(path.as_str());
    }
    Ok(())
}
