// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hook engine: ordered, named lifecycle points where a plugin can
//! rewrite the plan text in flight, or react to a bus event before triage
//! sees it. Plugins register their hooks once at startup (the Rust
//! equivalent of the dynamically-loaded-module factory pattern); what
//! runs each tick is just the ordered list for that point.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use wharf_core::{Action, Event};

/// The lifecycle points a plan-shaping hook may register at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanHookPoint {
    AfterDesign,
    BeforeTodo,
    AfterTodo,
    BeforeFinish,
    AfterFinish,
}

#[derive(Debug, Error)]
#[error("hook {hook} at {point} failed: {message}")]
pub struct HookError {
    pub hook: String,
    pub point: &'static str,
    pub message: String,
}

impl HookError {
    pub fn plan(hook: impl Into<String>, point: PlanHookPoint, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            point: point_name(point),
            message: message.into(),
        }
    }

    pub fn event(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            point: "onEvent",
            message: message.into(),
        }
    }
}

fn point_name(point: PlanHookPoint) -> &'static str {
    match point {
        PlanHookPoint::AfterDesign => "afterDesign",
        PlanHookPoint::BeforeTodo => "beforeTodo",
        PlanHookPoint::AfterTodo => "afterTodo",
        PlanHookPoint::BeforeFinish => "beforeFinish",
        PlanHookPoint::AfterFinish => "afterFinish",
    }
}

/// Abstracts invoking the configured worker assistant from inside a hook's
/// `runAgent` context method: injects a plan-format reference and a
/// "write your answer to this path" instruction, waits for completion,
/// and reads back the result file.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    async fn run_agent(&self, prompt: &str, files: &[PathBuf]) -> Result<String, HookError>;
}

/// Plugin-scoped and global key-value storage a hook can read and write
/// across invocations (`getState`/`setState`, `getGlobalState`/`setGlobalState`).
#[derive(Default)]
pub struct HookState {
    plugin: Mutex<std::collections::HashMap<String, serde_json::Value>>,
    global: Mutex<std::collections::HashMap<String, serde_json::Value>>,
}

impl HookState {
    pub fn get_state(&self, key: &str) -> Option<serde_json::Value> {
        self.plugin.lock().get(key).cloned()
    }

    pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
        self.plugin.lock().insert(key.into(), value);
    }

    pub fn get_global_state(&self, key: &str) -> Option<serde_json::Value> {
        self.global.lock().get(key).cloned()
    }

    pub fn set_global_state(&self, key: impl Into<String>, value: serde_json::Value) {
        self.global.lock().insert(key.into(), value);
    }
}

/// Everything a hook invocation needs: identity of the plan/step it runs
/// for, a way to run the worker assistant, a way to emit outbound actions,
/// and plugin/global state.
pub struct HookContext {
    pub repo_root: PathBuf,
    pub worktree: PathBuf,
    pub plan_id: String,
    pub change_request_ref: Option<String>,
    pub todo_completed: Option<String>,
    pub agent_runner: Arc<dyn AgentRunner>,
    emitted_actions: Mutex<Vec<Action>>,
    state: HookState,
}

impl HookContext {
    pub fn new(
        repo_root: PathBuf,
        worktree: PathBuf,
        plan_id: String,
        agent_runner: Arc<dyn AgentRunner>,
    ) -> Self {
        Self {
            repo_root,
            worktree,
            plan_id,
            change_request_ref: None,
            todo_completed: None,
            agent_runner,
            emitted_actions: Mutex::new(Vec::new()),
            state: HookState::default(),
        }
    }

    pub async fn run_agent(&self, prompt: &str, files: &[PathBuf]) -> Result<String, HookError> {
        self.agent_runner.run_agent(prompt, files).await
    }

    pub fn emit_action(&self, action: Action) {
        self.emitted_actions.lock().push(action);
    }

    /// Drain the actions emitted during this hook invocation, for the
    /// dispatcher to append to the bus.
    pub fn take_emitted_actions(&self) -> Vec<Action> {
        std::mem::take(&mut *self.emitted_actions.lock())
    }

    pub fn get_state(&self, key: &str) -> Option<serde_json::Value> {
        self.state.get_state(key)
    }

    pub fn set_state(&self, key: impl Into<String>, value: serde_json::Value) {
        self.state.set_state(key, value)
    }

    pub fn get_global_state(&self, key: &str) -> Option<serde_json::Value> {
        self.state.get_global_state(key)
    }

    pub fn set_global_state(&self, key: impl Into<String>, value: serde_json::Value) {
        self.state.set_global_state(key, value)
    }
}

#[async_trait]
pub trait PlanHook: Send + Sync {
    fn name(&self) -> &str;
    async fn call(&self, plan: String, ctx: &HookContext) -> Result<String, HookError>;
}

/// Outcome of one `onEvent` hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event was fully handled by this hook; later hooks and the
    /// default triage behavior are skipped.
    Handled,
    /// The event should be held and reconsidered on a later tick.
    Deferred,
    /// This hook had nothing to say about the event; try the next one.
    Passthrough,
}

#[async_trait]
pub trait EventHook: Send + Sync {
    fn name(&self) -> &str;
    async fn call(&self, event: &Event, ctx: &HookContext) -> Result<EventOutcome, HookError>;
}

/// The ordered set of hooks registered at each lifecycle point. A
/// duplicate registration at the same point appends to that point's list.
#[derive(Default)]
pub struct HookEngine {
    plan_hooks: std::collections::HashMap<PlanHookPoint, Vec<Arc<dyn PlanHook>>>,
    event_hooks: Vec<Arc<dyn EventHook>>,
}

impl HookEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_plan_hook(&mut self, point: PlanHookPoint, hook: Arc<dyn PlanHook>) {
        self.plan_hooks.entry(point).or_default().push(hook);
    }

    pub fn register_event_hook(&mut self, hook: Arc<dyn EventHook>) {
        self.event_hooks.push(hook);
    }

    /// Run every hook registered at `point` in order, threading the plan
    /// text through: the output of one hook is the input of the next. If
    /// a hook returns an error, the chain stops there (the caller is
    /// responsible for aborting the current lifecycle step and blocking
    /// the plan).
    pub async fn run_plan_hooks(
        &self,
        point: PlanHookPoint,
        mut plan: String,
        ctx: &HookContext,
    ) -> Result<String, HookError> {
        if let Some(hooks) = self.plan_hooks.get(&point) {
            for hook in hooks {
                plan = hook.call(plan, ctx).await?;
            }
        }
        Ok(plan)
    }

    /// Run registered `onEvent` hooks in order until one returns something
    /// other than `Passthrough`, or all have passed.
    pub async fn run_event_hooks(
        &self,
        event: &Event,
        ctx: &HookContext,
    ) -> Result<EventOutcome, HookError> {
        for hook in &self.event_hooks {
            match hook.call(event, ctx).await? {
                EventOutcome::Passthrough => continue,
                other => return Ok(other),
            }
        }
        Ok(EventOutcome::Passthrough)
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
