//! Module Command
//!
//! Usage:
//!   docsync module create <slug> --name <name> [--description <text>] <files>...
//!   docsync module add <slug> <files>...
//!   docsync module remove <slug> <files>...
//!   docsync module list [--json]
//!   docsync module show <slug> [--json]
//!
//! Files added by hand start undocumented; the next sync regenerates the
//! module narrative.

use serde_json::json;

use crate::cli::{CommandContext, Output, parse_paths};
use crate::modules::narrative;
use crate::types::{IntegrityError, Result};

pub async fn create(slug: &str, name: Option<&str>, description: &str, files: &[String]) -> Result<()> {
    let ctx = CommandContext::load()?;
    let paths = parse_paths(files)?;
    let module = ctx
        .graph()
        .create(slug, name.unwrap_or(slug), description, &paths)
        .await?;

    Output::new().success(&format!(
        "Created module '{}' with {} files",
        module.slug, module.statistics.total
    ));
    Ok(())
}

pub async fn add(slug: &str, files: &[String]) -> Result<()> {
    let ctx = CommandContext::load()?;
    let paths = parse_paths(files)?;
    let added = ctx.graph().add_files(slug, &paths, false).await?;

    let out = Output::new();
    if added == 0 {
        out.info(&format!("'{}' already contains every given file", slug));
    } else {
        out.success(&format!("Added {} files to '{}'", added, slug));
    }
    Ok(())
}

pub async fn remove(slug: &str, files: &[String]) -> Result<()> {
    let ctx = CommandContext::load()?;
    let paths = parse_paths(files)?;
    let removed = ctx.graph().remove_files(slug, &paths).await?;
    Output::new().success(&format!("Removed {} files from '{}'", removed, slug));
    Ok(())
}

pub async fn list(as_json: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let modules = ctx.graph().all_modules().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&modules)?);
        return Ok(());
    }

    let out = Output::new();
    if modules.is_empty() {
        out.info("No modules yet. Create one with 'docsync module create'.");
        return Ok(());
    }
    out.header("Modules");
    for module in &modules {
        out.field(
            &module.slug,
            format!(
                "{} ({} files, {} undocumented)",
                module.name, module.statistics.total, module.statistics.undocumented
            ),
        );
    }
    Ok(())
}

pub async fn show(slug: &str, as_json: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let graph = ctx.graph();
    let module = graph
        .load(slug)
        .await?
        .ok_or_else(|| IntegrityError::ModuleNotFound(slug.to_string()))?;
    let document = graph.read_narrative(slug).await?;

    if as_json {
        let value = json!({
            "module": module,
            "narrative_path": graph.narrative_path(slug),
            "has_narrative": document.is_some(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&module.name);
    out.field("Slug", &module.slug);
    out.field("Narrative", graph.narrative_path(slug).display());
    out.field(
        "Last synced",
        module
            .last_synced_revision
            .as_ref()
            .map(|r| r.short())
            .unwrap_or("(never)"),
    );

    if let Some(text) = document {
        match narrative::parse(&text) {
            Ok(doc) => {
                if let Some(overview) = doc.overview() {
                    out.section("Overview");
                    println!("{}", overview);
                }
            }
            Err(e) => out.warning(&format!("Narrative is malformed: {}", e)),
        }
    }

    out.section("Files");
    for file in &module.documented_files {
        out.line(&format!("✓ {} [{}]", file.path, file.tier));
    }
    for path in &module.undocumented_files {
        out.line(&format!("… {} (pending)", path));
    }
    Ok(())
}
