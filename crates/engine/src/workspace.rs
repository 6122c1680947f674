// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git worktree lifecycle: create an isolated working tree for an activated
//! plan, commit and rebase it, push the branch, and tear it down again once
//! the plan is done.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;

use wharf_adapters::subprocess::{run_with_timeout, GIT_WORKTREE_TIMEOUT};

const MAX_CREATE_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("worktree target {path} already exists and is not an empty or known worktree")]
    WorktreeExists { path: PathBuf },
    #[error("{operation} failed: {stderr}")]
    Git { operation: String, stderr: String },
    #[error("{operation}: {0}", operation = "git command")]
    Run(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of [`create_worktree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedWorktree {
    pub worktree_path: PathBuf,
    pub branch: String,
}

/// Result of [`rebase_on_base_branch`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RebaseOutcome {
    pub success: bool,
    pub has_conflicts: bool,
    pub conflict_files: Vec<String>,
}

fn git(repo: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(repo);
    cmd
}

async fn run(cmd: Command, operation: &str) -> Result<std::process::Output, WorkspaceError> {
    run_with_timeout(cmd, GIT_WORKTREE_TIMEOUT, operation)
        .await
        .map_err(WorkspaceError::Run)
}

fn check(output: std::process::Output, operation: &str) -> Result<(), WorkspaceError> {
    if output.status.success() {
        Ok(())
    } else {
        Err(WorkspaceError::Git {
            operation: operation.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Random alphanumeric suffix for branch/worktree collision retries. Not
/// cryptographic; only needs to avoid colliding with a sibling worktree.
fn random_suffix() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    format!("{:x}", nanos ^ (std::process::id() as u32))
}

async fn known_worktree_paths(repo: &Path) -> Vec<PathBuf> {
    let mut cmd = git(repo);
    cmd.arg("worktree").arg("list").arg("--porcelain");
    let Ok(output) = run(cmd, "git worktree list").await else {
        return Vec::new();
    };
    if !output.status.success() {
        return Vec::new();
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .filter_map(|line| line.strip_prefix("worktree "))
        .map(PathBuf::from)
        .collect()
}

fn dir_is_empty(path: &Path) -> bool {
    std::fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Fetch `base_branch` from `remote`, create a new branch rooted there, and
/// materialize a worktree for it under `worktrees_dir`.
///
/// On a name collision (the candidate directory already exists), retries
/// with a random suffix appended to the branch name. Fails with
/// [`WorkspaceError::WorktreeExists`] if every attempt lands on a directory
/// that is non-empty and not itself a known worktree.
pub async fn create_worktree(
    repo: &Path,
    worktrees_dir: &Path,
    branch: &str,
    base_branch: &str,
    remote: &str,
) -> Result<CreatedWorktree, WorkspaceError> {
    let mut fetch = git(repo);
    fetch.arg("fetch").arg(remote).arg(base_branch);
    check(run(fetch, "git fetch").await?, "git fetch")?;

    let base_ref = format!("{remote}/{base_branch}");

    for attempt in 0..MAX_CREATE_ATTEMPTS {
        let candidate_branch = if attempt == 0 {
            branch.to_string()
        } else {
            format!("{branch}-{}", random_suffix())
        };
        let candidate_path = worktrees_dir.join(&candidate_branch);

        if candidate_path.exists() {
            if dir_is_empty(&candidate_path) {
                std::fs::remove_dir(&candidate_path).map_err(|source| WorkspaceError::Io {
                    path: candidate_path.clone(),
                    source,
                })?;
            } else {
                let known = known_worktree_paths(repo).await;
                let is_known = known.iter().any(|p| p == &candidate_path);
                if !is_known {
                    if attempt + 1 == MAX_CREATE_ATTEMPTS {
                        return Err(WorkspaceError::WorktreeExists {
                            path: candidate_path,
                        });
                    }
                    continue;
                }
                if attempt + 1 == MAX_CREATE_ATTEMPTS {
                    return Err(WorkspaceError::WorktreeExists {
                        path: candidate_path,
                    });
                }
                continue;
            }
        }

        let mut add = git(repo);
        add.arg("worktree")
            .arg("add")
            .arg("-b")
            .arg(&candidate_branch)
            .arg(&candidate_path)
            .arg(&base_ref);
        let output = run(add, "git worktree add").await?;
        if output.status.success() {
            return Ok(CreatedWorktree {
                worktree_path: candidate_path,
                branch: candidate_branch,
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("already exists") && attempt + 1 < MAX_CREATE_ATTEMPTS {
            continue;
        }
        return Err(WorkspaceError::Git {
            operation: "git worktree add".to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Err(WorkspaceError::WorktreeExists {
        path: worktrees_dir.join(branch),
    })
}

/// Stage everything in `path` and commit with `message`. Returns `false`
/// (no commit made) if the working tree has nothing staged.
pub async fn commit_all(path: &Path, message: &str) -> Result<bool, WorkspaceError> {
    let mut add = git(path);
    add.arg("add").arg("-A");
    check(run(add, "git add").await?, "git add")?;

    let mut diff = git(path);
    diff.arg("diff").arg("--cached").arg("--quiet");
    let diff_output = run(diff, "git diff --cached").await?;
    if diff_output.status.success() {
        return Ok(false);
    }

    let mut commit = git(path);
    commit.arg("commit").arg("-m").arg(message);
    check(run(commit, "git commit").await?, "git commit")?;
    Ok(true)
}

/// Rebase `path`'s current branch onto `base`. Aborts the rebase and
/// reports conflicting files if one occurs.
pub async fn rebase_on_base_branch(
    path: &Path,
    base: &str,
) -> Result<RebaseOutcome, WorkspaceError> {
    let mut rebase = git(path);
    rebase.arg("rebase").arg(base);
    let output = run(rebase, "git rebase").await?;
    if output.status.success() {
        return Ok(RebaseOutcome {
            success: true,
            has_conflicts: false,
            conflict_files: Vec::new(),
        });
    }

    let mut status = git(path);
    status.arg("status").arg("--porcelain");
    let status_output = run(status, "git status").await?;
    let conflict_files: Vec<String> = String::from_utf8_lossy(&status_output.stdout)
        .lines()
        .filter(|line| line.starts_with("UU") || line.starts_with("AA"))
        .filter_map(|line| line.get(3..).map(str::to_string))
        .collect();

    let mut abort = git(path);
    abort.arg("rebase").arg("--abort");
    let _ = run(abort, "git rebase --abort").await;

    Ok(RebaseOutcome {
        success: false,
        has_conflicts: !conflict_files.is_empty(),
        conflict_files,
    })
}

/// Push `branch` to `remote` with `--force-with-lease`, failing if the
/// remote has advanced since the local branch last tracked it.
pub async fn force_push(path: &Path, remote: &str, branch: &str) -> Result<(), WorkspaceError> {
    let mut push = git(path);
    push.arg("push")
        .arg("--force-with-lease")
        .arg(remote)
        .arg(branch);
    check(run(push, "git push --force-with-lease").await?, "git push")
}

/// Remove a worktree: best-effort `git worktree remove`, then unconditional
/// recursive directory removal so a damaged or already-deregistered
/// worktree never blocks cleanup.
pub async fn remove_worktree(_repo: &Path, path: &Path) -> Result<(), WorkspaceError> {
    if !path.is_dir() {
        return Ok(());
    }

    let dot_git = path.join(".git");
    let is_worktree = tokio::fs::symlink_metadata(&dot_git)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    if is_worktree {
        let mut remove = Command::new("git");
        remove
            .arg("worktree")
            .arg("remove")
            .arg("--force")
            .arg(path)
            .current_dir(path);
        let _ = run_with_timeout(remove, GIT_WORKTREE_TIMEOUT, "git worktree remove").await;
    }

    tokio::fs::remove_dir_all(path)
        .await
        .map_err(|source| WorkspaceError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
