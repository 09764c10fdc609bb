//! Git CLI backend
//!
//! Every operation is one `git` subprocess with a bounded runtime.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{ChangeStatus, PathChange, VersionControl};
use crate::types::{Result, RevisionId, SourcePath, SyncError};

/// Exit status git uses for fatal errors, including "object not found"
const GIT_FATAL: i32 = 128;

pub struct GitCli {
    root: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    /// Run git with `args` and return the raw output regardless of exit status
    async fn run(&self, args: &[&str]) -> Result<Output> {
        let command = format!("git {}", args.join(" "));
        debug!(command = %command, "Running git");

        let child = Command::new("git")
            .arg("-c")
            .arg("core.quotepath=false")
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SyncError::revision(&command, format!("failed to spawn git: {}", e)))?;

        timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                SyncError::revision(
                    &command,
                    format!("timed out after {}s", self.timeout.as_secs()),
                )
            })?
            .map_err(|e| SyncError::revision(&command, e.to_string()))
    }

    /// Run git and require success, returning stdout
    async fn run_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(SyncError::revision(
                format!("git {}", args.join(" ")),
                failure_message(&output),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.trim().is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.trim().to_string()
    }
}

/// Whether a fatal `git show` failure means the object simply is not there
fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("does not exist")
        || lower.contains("exists on disk, but not in")
        || lower.contains("invalid object name")
        || lower.contains("not a valid object name")
}

/// Parse `git diff --name-status --no-renames` output
pub(crate) fn parse_name_status(stdout: &str) -> Vec<PathChange> {
    stdout
        .lines()
        .filter_map(|line| {
            let (status, path) = line.split_once('\t')?;
            let status = match status.chars().next()? {
                'A' => ChangeStatus::Added,
                'D' => ChangeStatus::Deleted,
                'M' | 'T' => ChangeStatus::Modified,
                _ => return None,
            };
            Some(PathChange {
                path: path.trim().to_string(),
                status,
            })
        })
        .collect()
}

#[async_trait]
impl VersionControl for GitCli {
    async fn resolve(&self, rev: &str) -> Result<RevisionId> {
        let spec = format!("{}^{{commit}}", rev);
        let stdout = self.run_ok(&["rev-parse", "--verify", &spec]).await?;
        Ok(RevisionId::new(stdout))
    }

    async fn changed_paths(&self, from: &RevisionId, to: &RevisionId) -> Result<Vec<PathChange>> {
        let stdout = self
            .run_ok(&[
                "diff",
                "--name-status",
                "--no-renames",
                from.as_str(),
                to.as_str(),
            ])
            .await?;
        Ok(parse_name_status(&stdout))
    }

    async fn diff(
        &self,
        path: &SourcePath,
        from: &RevisionId,
        to: &RevisionId,
    ) -> Result<String> {
        self.run_ok(&["diff", from.as_str(), to.as_str(), "--", path.as_str()])
            .await
    }

    async fn show(&self, path: &SourcePath, rev: &RevisionId) -> Result<Option<String>> {
        let object = format!("{}:{}", rev, path);
        let output = self.run(&["show", &object]).await?;

        if output.status.success() {
            return Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.code() == Some(GIT_FATAL) && is_not_found(&stderr) {
            debug!(path = %path, rev = %rev.short(), "Path not present at revision");
            return Ok(None);
        }

        Err(SyncError::revision(
            format!("git show {}", object),
            failure_message(&output),
        ))
    }

    async fn last_touching(
        &self,
        path: &SourcePath,
        rev: &RevisionId,
    ) -> Result<Option<RevisionId>> {
        let stdout = self
            .run_ok(&["log", "-1", "--format=%H", rev.as_str(), "--", path.as_str()])
            .await?;
        let trimmed = stdout.trim();
        Ok((!trimmed.is_empty()).then(|| RevisionId::new(trimmed)))
    }

    async fn is_ancestor(&self, ancestor: &RevisionId, descendant: &RevisionId) -> Result<bool> {
        let output = self
            .run(&[
                "merge-base",
                "--is-ancestor",
                ancestor.as_str(),
                descendant.as_str(),
            ])
            .await?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(SyncError::revision(
                "git merge-base --is-ancestor",
                failure_message(&output),
            )),
        }
    }

    async fn list_files(&self, rev: &RevisionId) -> Result<Vec<String>> {
        let stdout = self
            .run_ok(&["ls-tree", "-r", "--name-only", rev.as_str()])
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }
}
