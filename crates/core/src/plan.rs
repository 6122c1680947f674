// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan identifier and the scheduler-owned [`PlanState`] record.
//!
//! `PlanState` is the unit the dispatcher mutates every tick (§3 of the
//! design doc). The plan's markdown content — sections, TODO items — is a
//! separate concern owned by `wharf-plan`; this type only tracks what the
//! scheduler needs to decide what to do next.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::agent::AgentKind;

crate::define_id! {
    /// Unique, filesystem-safe, human-chosen identifier for a plan.
    #[derive(Default)]
    pub struct PlanId;
}

/// Number of times a checklist item may fail to advance before the plan is
/// blocked. See §4.8 / §8 invariant 6.
pub const MAX_TODO_RETRIES: u32 = 3;

/// Where a plan sits in its lifecycle (§3 "Lifecycle").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Queued,
    Active,
    Blocked,
    Review,
    Reviewing,
    Triaging,
    Done,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Queued => "queued",
            PlanStatus::Active => "active",
            PlanStatus::Blocked => "blocked",
            PlanStatus::Review => "review",
            PlanStatus::Reviewing => "reviewing",
            PlanStatus::Triaging => "triaging",
            PlanStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The scheduler's full record of one plan. Persisted as a value in the
/// `plans` map of the state store (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanState {
    pub status: PlanStatus,
    pub agent: AgentKind,

    // Present iff activated (§3 invariant: workspace set <=> these are set).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_relpath: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_request_ref: Option<String>,

    // Exactly one of these is set while a subprocess is running (§3 invariant).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmux_session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_todo_index: Option<usize>,
    #[serde(default)]
    pub todo_retry_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_polled_at: Option<u64>,

    /// Orthogonal scheduler gate; see the spec's Open Question on the
    /// relationship between this and `status == Blocked` (DESIGN.md).
    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub poll_once: bool,
    #[serde(default)]
    pub pending_review: bool,
}

impl PlanState {
    /// A freshly queued plan still sitting in the inbox.
    pub fn new_queued(agent: AgentKind) -> Self {
        Self {
            status: PlanStatus::Queued,
            agent,
            worktree: None,
            branch: None,
            base_branch: None,
            plan_relpath: None,
            change_request_ref: None,
            tmux_session: None,
            pid: None,
            last_todo_index: None,
            todo_retry_count: 0,
            last_error: None,
            last_polled_at: None,
            blocked: false,
            poll_once: false,
            pending_review: false,
        }
    }

    /// True once a workspace has been materialized for this plan.
    pub fn is_activated(&self) -> bool {
        self.worktree.is_some()
    }

    /// The dispatcher must skip plans that are blocked or finished.
    pub fn is_schedulable(&self) -> bool {
        !self.blocked && self.status != PlanStatus::Done
    }

    /// True while a subprocess handle (tmux session or bare pid) is recorded.
    pub fn has_running_subprocess(&self) -> bool {
        self.tmux_session.is_some() || self.pid.is_some()
    }

    /// Clear whichever subprocess handle is set. Called once a process is
    /// known to have exited or been killed.
    pub fn clear_subprocess(&mut self) {
        self.tmux_session = None;
        self.pid = None;
    }

    /// Record an attempt at the current head item that failed to advance it.
    /// Returns the new retry count.
    pub fn record_todo_failure(&mut self, head_index: usize) -> u32 {
        self.advance_head(head_index);
        self.todo_retry_count += 1;
        self.todo_retry_count
    }

    /// Whether the retry count has reached the blocking threshold.
    pub fn retries_exhausted(&self) -> bool {
        self.todo_retry_count >= MAX_TODO_RETRIES
    }

    /// Move the tracked head index forward, resetting the retry counter if
    /// the head actually changed (§4.8 "Retry counter reset").
    pub fn advance_head(&mut self, head_index: usize) {
        if self.last_todo_index != Some(head_index) {
            self.last_todo_index = Some(head_index);
            self.todo_retry_count = 0;
        }
    }

    /// Clear the blocked flag and reset retry bookkeeping, leaving `status`
    /// untouched (the "unblock" operator directive, §4.8 "Cancellation").
    pub fn unblock(&mut self) {
        self.blocked = false;
        self.todo_retry_count = 0;
        self.last_error = None;
    }

    /// Mark the plan blocked with a reason, per §7 error propagation.
    pub fn block(&mut self, reason: impl Into<String>) {
        self.blocked = true;
        self.last_error = Some(reason.into());
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
