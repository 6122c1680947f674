// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires `wharf_engine::hooks::AgentRunner` (the narrow "run the worker
//! assistant and read back its answer" capability a hook needs) to the real
//! `wharf_adapters::AssistantAdapter`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use wharf_adapters::{poll_completion, AssistantAdapter, ExecuteRequest, SessionAdapter};
use wharf_core::{AgentKind, CompletionOutcome};
use wharf_engine::{AgentRunner, HookError};

/// Runs a hook-requested prompt through the configured assistant, exactly
/// like a checklist-item invocation, except the assistant is told to write
/// its answer to a fixed sibling file rather than edit the plan directly.
pub struct DefaultAgentRunner<S: SessionAdapter> {
    adapter: AssistantAdapter<S>,
    sessions: S,
    kind: AgentKind,
    timeout: Duration,
    cwd: PathBuf,
    model: Option<String>,
}

impl<S: SessionAdapter> DefaultAgentRunner<S> {
    pub fn new(
        adapter: AssistantAdapter<S>,
        sessions: S,
        kind: AgentKind,
        timeout: Duration,
        cwd: PathBuf,
        model: Option<String>,
    ) -> Self {
        Self {
            adapter,
            sessions,
            kind,
            timeout,
            cwd,
            model,
        }
    }
}

#[async_trait]
impl<S: SessionAdapter> AgentRunner for DefaultAgentRunner<S> {
    async fn run_agent(&self, prompt: &str, _files: &[PathBuf]) -> Result<String, HookError> {
        if self.kind == AgentKind::Manual {
            return Err(HookError::event(
                "runAgent",
                "manual agents have no subprocess to run; the operator must answer this hook by hand",
            ));
        }

        let answer_path = self.cwd.join("hook-answer.md");
        let full_prompt = format!(
            "{prompt}\n\nWrite your answer to `{}` and nothing else.",
            answer_path.display()
        );

        let mut req = ExecuteRequest::new(self.cwd.clone(), full_prompt);
        if let Some(model) = &self.model {
            req = req.with_model(model.clone());
        }

        let handle = self
            .adapter
            .execute(self.kind, req)
            .await
            .map_err(|e| HookError::event("runAgent", format!("failed to start agent: {e}")))?;

        let outcome = poll_completion(&self.sessions, &handle, self.timeout).await;
        if outcome != CompletionOutcome::Found {
            return Err(HookError::event(
                "runAgent",
                format!("agent invocation {outcome}"),
            ));
        }

        tokio::fs::read_to_string(&answer_path)
            .await
            .map_err(|e| HookError::event("runAgent", format!("failed to read hook answer: {e}")))
    }
}
