//! Status Command
//!
//! Display pending sync work without changing anything.

use crate::cli::{CommandContext, Output};
use crate::config::ConfigLoader;
use crate::types::Result;

pub async fn run(as_json: bool, detailed: bool) -> Result<()> {
    let root = std::env::current_dir()?;
    let out = Output::new();

    if !ConfigLoader::is_project_initialized(&root) {
        if as_json {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            out.header("docsync Status");
            out.info("Not initialized. Run 'docsync init' first.");
        }
        // Informational command
        return Ok(());
    }

    let ctx = CommandContext::load_at(&root)?;
    let status = ctx.status().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    out.header("docsync Status");
    out.field(
        "Baseline",
        status.baseline.as_ref().map(|r| r.short()).unwrap_or("(never synced)"),
    );
    out.field("HEAD", status.head.short());
    out.field("Tracked files", status.tracked_files);

    out.section("Pending");
    out.field("New", status.pending_new.len());
    out.field("Changed", status.pending_changed.len());
    out.field("Deleted", status.pending_deleted.len());
    out.field("Stale modules", status.stale_modules.len());

    out.section("Modules");
    out.field("Modules", status.modules);
    out.field("Unassigned files", status.unassigned);
    out.field("Excluded files", status.excluded);
    out.field("Low confidence", status.low_confidence);
    if let Some(at) = status.last_analysis {
        out.field("Last analysis", at.to_rfc3339());
    }

    if detailed {
        for path in &status.pending_new {
            out.line(&format!("+ {}", path));
        }
        for path in &status.pending_changed {
            out.line(&format!("~ {}", path));
        }
        for path in &status.pending_deleted {
            out.line(&format!("- {}", path));
        }
        for slug in &status.stale_modules {
            out.line(&format!("module {}", slug));
        }
    }

    println!();
    if status.is_up_to_date() {
        out.success("Documentation is up to date");
    } else {
        out.info("Run 'docsync sync' to catch up");
    }
    Ok(())
}
