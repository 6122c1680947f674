// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identifier.
//!
//! A workspace is the per-plan git worktree created by the workspace manager.
//! `WorkspaceId` is distinct from the worktree path: the id is stable for the
//! lifetime of a plan's activation, the path is derived from `worktrees_dir`
//! and the branch name.

crate::define_id! {
    /// Unique identifier for a workspace instance.
    pub struct WorkspaceId;
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
