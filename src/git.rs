use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::debug;

use crate::error::GitError;

/// Point-in-time summary of a repository's ref namespace, used for
/// before/after comparison between the source and the destination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RepoSnapshot {
    pub branches: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub commit_count: u64,
}

#[async_trait]
pub trait MirrorGit {
    /// Full-fidelity mirror copy of `remote_url` into `dest_path`.
    ///
    /// Destructive: `dest_path` is removed first if it exists. Callers own
    /// that path exclusively and must be willing to have it wiped.
    async fn mirror_clone(&self, remote_url: &str, dest_path: &Path)
        -> Result<RepoSnapshot, GitError>;

    /// Pushes every ref in the local mirror to `remote_url`. Never retried
    /// automatically; safe to re-run after fixing credentials.
    async fn mirror_push(&self, local_path: &Path, remote_url: &str) -> Result<(), GitError>;

    /// Read-only inspection, shared by the analysis and validation steps.
    async fn inspect(&self, local_path: &Path) -> Result<RepoSnapshot, GitError>;
}

/// `MirrorGit` backed by the local `git` binary's mirror semantics.
#[derive(Clone, Copy, Debug, Default)]
pub struct GitCli;

#[async_trait]
impl MirrorGit for GitCli {
    async fn mirror_clone(
        &self,
        remote_url: &str,
        dest_path: &Path,
    ) -> Result<RepoSnapshot, GitError> {
        if dest_path.exists() {
            std::fs::remove_dir_all(dest_path).map_err(|err| GitError::PathUnwritable {
                path: dest_path.to_path_buf(),
                detail: err.to_string(),
            })?;
        }
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| GitError::PathUnwritable {
                path: dest_path.to_path_buf(),
                detail: err.to_string(),
            })?;
        }

        debug!(remote = remote_url, "mirror clone");
        let dest = dest_path.to_string_lossy().to_string();
        run_git(&["clone", "--mirror", remote_url, &dest])
            .await
            .map_err(|detail| GitError::CloneFailed {
                remote: remote_url.to_string(),
                detail,
            })?;

        self.inspect(dest_path).await
    }

    async fn mirror_push(&self, local_path: &Path, remote_url: &str) -> Result<(), GitError> {
        debug!(remote = remote_url, "mirror push");
        let local = local_path.to_string_lossy().to_string();
        run_git(&["-C", &local, "push", "--mirror", remote_url])
            .await
            .map_err(|detail| GitError::PushFailed {
                remote: remote_url.to_string(),
                detail,
            })?;
        Ok(())
    }

    async fn inspect(&self, local_path: &Path) -> Result<RepoSnapshot, GitError> {
        let local = local_path.to_string_lossy().to_string();
        let inspect_err = |detail: String| GitError::Inspect {
            path: local_path.to_path_buf(),
            detail,
        };

        let refs = run_git(&[
            "-C",
            &local,
            "for-each-ref",
            "--format=%(refname)",
            "refs/heads",
            "refs/tags",
        ])
        .await
        .map_err(inspect_err)?;

        let count = run_git(&["-C", &local, "rev-list", "--all", "--count"])
            .await
            .map_err(inspect_err)?;

        let (branches, tags) = parse_ref_names(&refs);
        let commit_count = parse_commit_count(&count).map_err(inspect_err)?;

        Ok(RepoSnapshot {
            branches,
            tags,
            commit_count,
        })
    }
}

async fn run_git(args: &[&str]) -> Result<String, String> {
    let output = Command::new("git")
        .args(args)
        .output()
        .await
        .map_err(|err| format!("failed to spawn git: {}", err))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut detail = format!("git {} exited with {}", args.join(" "), output.status);
        if !stderr.trim().is_empty() {
            detail.push_str(&format!("; stderr: {}", stderr.trim()));
        }
        if !stdout.trim().is_empty() {
            detail.push_str(&format!("; stdout: {}", stdout.trim()));
        }
        return Err(detail);
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Splits `for-each-ref` output into branch and tag name sets.
fn parse_ref_names(output: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut branches = BTreeSet::new();
    let mut tags = BTreeSet::new();

    for line in output.lines() {
        let refname = line.trim();
        if let Some(name) = refname.strip_prefix("refs/heads/") {
            branches.insert(name.to_string());
        } else if let Some(name) = refname.strip_prefix("refs/tags/") {
            tags.insert(name.to_string());
        }
    }

    (branches, tags)
}

fn parse_commit_count(output: &str) -> Result<u64, String> {
    output
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("unparseable rev-list count: `{}`", output.trim()))
}
