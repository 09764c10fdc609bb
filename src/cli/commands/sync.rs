//! Sync Command
//!
//! Bring the documentation tree up to date with HEAD, or with HEAD for an
//! explicit set of files.

use crate::cli::{CommandContext, Output, parse_paths};
use crate::sync::SyncReport;
use crate::types::Result;

pub struct SyncOptions {
    pub files: Vec<String>,
    pub json: bool,
    pub quiet: bool,
}

/// Run a sync and print its report; the report is returned for exit status
pub async fn run(options: SyncOptions) -> Result<SyncReport> {
    let ctx = CommandContext::load()?;
    let orchestrator = ctx.orchestrator().await?;

    let report = if options.files.is_empty() {
        orchestrator.sync().await?
    } else {
        let paths = parse_paths(&options.files)?;
        orchestrator.sync_files(&paths).await?
    };

    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &Output::quiet(options.quiet));
    }
    Ok(report)
}

fn print_report(report: &SyncReport, out: &Output) {
    out.header("Sync Report");
    out.field("Run", report.run_id);
    out.field(
        "Revisions",
        format!(
            "{} → {}",
            report.from.as_ref().map(|r| r.short()).unwrap_or("(none)"),
            report.to.short()
        ),
    );
    out.field(
        "Files",
        format!(
            "{} synced, {} skipped, {} requeued, {} failed",
            report.files.succeeded, report.files.skipped, report.files.requeued, report.files.failed
        ),
    );
    out.field("Deleted", report.deleted);
    out.field(
        "Modules",
        format!(
            "{} regenerated, {} skipped, {} requeued, {} failed",
            report.modules.succeeded,
            report.modules.skipped,
            report.modules.requeued,
            report.modules.failed
        ),
    );
    let assignment = &report.assignment;
    if assignment.analyzed > 0 {
        out.field(
            "Assignment",
            format!(
                "{} analyzed, {} applied, {} low confidence, {} rejected",
                assignment.analyzed, assignment.applied, assignment.low_confidence, assignment.rejected
            ),
        );
    }
    if assignment.failed {
        out.warning("Assignment suggestions failed; files stay unassigned");
    }

    for problem in &report.problems {
        out.warning(&format!("{}: {}", problem.item, problem.outcome));
    }

    if report.is_noop() {
        out.success("Already up to date");
    } else if report.is_complete() {
        out.success(&format!("Synced to {}", report.to.short()));
    } else if report.advanced {
        out.warning("Files synced; some modules will be regenerated next run");
    } else {
        out.warning("Baseline kept; pending units are retried next run");
    }
}
