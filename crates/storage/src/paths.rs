// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk layout (§6). Everything wharf persists under a single repo-local
//! directory; this type centralizes the paths so no other crate hardcodes a
//! join.

use std::path::{Path, PathBuf};

pub const DEFAULT_LOCAL_DIR_NAME: &str = "wharf";

/// Resolved set of paths rooted at `<repo>/<local>/`.
#[derive(Debug, Clone)]
pub struct RepoLayout {
    pub repo_root: PathBuf,
    local_dir_name: String,
}

impl RepoLayout {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            local_dir_name: DEFAULT_LOCAL_DIR_NAME.to_string(),
        }
    }

    pub fn with_local_dir_name(repo_root: impl Into<PathBuf>, local_dir_name: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            local_dir_name: local_dir_name.into(),
        }
    }

    /// `<repo>/<local>/`
    pub fn local_root(&self) -> PathBuf {
        self.repo_root.join(&self.local_dir_name)
    }

    pub fn config_path(&self) -> PathBuf {
        self.local_root().join("config.json")
    }

    pub fn state_path(&self) -> PathBuf {
        self.local_root().join("state.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.local_root().join("lock")
    }

    pub fn inbox_dir(&self) -> PathBuf {
        self.local_root().join("inbox")
    }

    pub fn bus_dir(&self) -> PathBuf {
        self.local_root().join("bus")
    }

    pub fn bus_state_dir(&self) -> PathBuf {
        self.bus_dir().join("state")
    }

    /// Unix domain socket the daemon's control listener binds.
    pub fn socket_path(&self) -> PathBuf {
        self.local_root().join("control.sock")
    }

    /// Pidfile written alongside the process lock so the CLI can report
    /// (and, if needed, signal) the running `wharfd` without holding the
    /// lock itself.
    pub fn pid_path(&self) -> PathBuf {
        self.local_root().join("daemon.pid")
    }

    pub fn log_path(&self) -> PathBuf {
        self.local_root().join("daemon.log")
    }

    /// `<worktree>/<local>/` for an activated plan's own copy of the layout.
    pub fn workspace_local_root(worktree: &Path, local_dir_name: &str) -> PathBuf {
        worktree.join(local_dir_name)
    }
}

#[cfg(test)]
#[path = "paths_tests.rs"]
mod tests;
