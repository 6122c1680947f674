// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! The pieces the dispatcher composes each tick: the git workspace manager,
//! the file bus, bridges and review providers, the hook engine, and the
//! plan resolver.

pub mod bus;
pub mod hooks;
pub mod resolver;
pub mod review;
pub mod workspace;

pub use hooks::{
    AgentRunner, EventHook, EventOutcome, HookContext, HookEngine, HookError, HookState,
    PlanHook, PlanHookPoint,
};
pub use resolver::{resolve_plan_id, ResolveError};
pub use review::{
    review_item_to_event, update_review_md_checkbox, LocalReviewProvider, PlatformReviewProvider,
    ReviewError, ReviewItem, ReviewProvider, ReviewProviderRegistry,
};
pub use workspace::{
    commit_all, create_worktree, force_push, rebase_on_base_branch, remove_worktree,
    CreatedWorktree, RebaseOutcome, WorkspaceError,
};
