// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent adapter (§4.4): one execution engine shared by every assistant
//! CLI, parameterized by [`AgentKind`] rather than split across one adapter
//! type per assistant. The prompt is always materialized to `worker.prompt`
//! and substituted into the command line so it never hits an argv length
//! limit; `execute`/`resume` choose an attached multiplexer session or a
//! detached background process depending on whether `tmux` is requested.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use wharf_core::{AgentKind, CompletionOutcome};

use super::session_id::{binary_name, resume_args};
use crate::session::{SessionAdapter, SessionError};

/// Default wall-clock budget for a single invocation (§4.4 "enforce a
/// wall-clock timeout (default two hours)").
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// How often `poll_completion` checks for the exit-code file.
pub const COMPLETION_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("manual agents have no subprocess to execute; the operator drives this plan by hand")]
    ManualNotExecutable,
    #[error("session error: {0}")]
    Session(#[from] SessionError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One invocation request, matching the `execute`/`resume` parameter set
/// in §4.4 (`cwd`, `prompt`, `tmux?`, `model?`, `sessionId?`, `purpose?`).
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    pub cwd: PathBuf,
    pub prompt: String,
    /// Multiplexer session name to use; `None` selects the detached
    /// background-process mode.
    pub tmux: Option<String>,
    pub model: Option<String>,
    /// Pre-generated session id, required for `claude` and offered as an
    /// optional fallback identity for `amp`.
    pub session_id: Option<String>,
    pub purpose: Option<String>,
    pub env: Vec<(String, String)>,
}

impl ExecuteRequest {
    pub fn new(cwd: impl Into<PathBuf>, prompt: impl Into<String>) -> Self {
        Self {
            cwd: cwd.into(),
            prompt: prompt.into(),
            tmux: None,
            model: None,
            session_id: None,
            purpose: None,
            env: Vec::new(),
        }
    }

    pub fn with_tmux(mut self, name: impl Into<String>) -> Self {
        self.tmux = Some(name.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// What came out of `execute`/`resume`: the running subprocess's identity
/// (`tmuxSession` xor `pid`) and the three sibling files it writes into.
#[derive(Debug, Clone)]
pub struct ExecutionHandle {
    pub tmux_session: Option<String>,
    pub pid: Option<u32>,
    pub prompt_path: PathBuf,
    pub log_path: PathBuf,
    pub exitcode_path: PathBuf,
}

#[derive(Clone)]
pub struct AssistantAdapter<S> {
    sessions: S,
}

impl<S: SessionAdapter> AssistantAdapter<S> {
    pub fn new(sessions: S) -> Self {
        Self { sessions }
    }

    /// Start a fresh invocation of `kind` in `req.cwd`.
    pub async fn execute(
        &self,
        kind: AgentKind,
        req: ExecuteRequest,
    ) -> Result<ExecutionHandle, AdapterError> {
        if kind == AgentKind::Manual {
            return Err(AdapterError::ManualNotExecutable);
        }
        let prompt_path = self.materialize_prompt(&req).await?;
        let command_line = build_fresh_command_line(kind, &req, &prompt_path);
        self.run(&req, command_line).await
    }

    /// Resume a previously started session using each assistant's own
    /// resume syntax (§4.4 table).
    pub async fn resume(
        &self,
        kind: AgentKind,
        session_id: &str,
        req: ExecuteRequest,
    ) -> Result<ExecutionHandle, AdapterError> {
        if kind == AgentKind::Manual {
            return Err(AdapterError::ManualNotExecutable);
        }
        let prompt_path = self.materialize_prompt(&req).await?;
        let mut parts = vec![binary_name(kind).to_string()];
        parts.extend(resume_args(kind, session_id));
        append_model_and_prompt(&mut parts, &req, &prompt_path);
        self.run(&req, parts.join(" ")).await
    }

    /// Foreground invocation with inherited stdio, for a human-driven
    /// session (§4.4 "interactive foreground").
    pub async fn interactive(
        &self,
        kind: AgentKind,
        req: ExecuteRequest,
    ) -> Result<std::process::ExitStatus, AdapterError> {
        if kind == AgentKind::Manual {
            return Err(AdapterError::ManualNotExecutable);
        }
        let prompt_path = self.materialize_prompt(&req).await?;
        let command_line = build_fresh_command_line(kind, &req, &prompt_path);

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&command_line).current_dir(&req.cwd);
        for (key, value) in &req.env {
            cmd.env(key, value);
        }
        Ok(cmd.status().await?)
    }

    async fn materialize_prompt(&self, req: &ExecuteRequest) -> Result<PathBuf, AdapterError> {
        let prompt_path = req.cwd.join("worker.prompt");
        if let Some(parent) = prompt_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&prompt_path, &req.prompt).await?;
        Ok(prompt_path)
    }

    async fn run(
        &self,
        req: &ExecuteRequest,
        command_line: String,
    ) -> Result<ExecutionHandle, AdapterError> {
        let prompt_path = req.cwd.join("worker.prompt");
        let log_path = req.cwd.join("worker.log");
        let exitcode_path = req.cwd.join("worker.exitcode");

        match &req.tmux {
            Some(name) => {
                // Pipe through a tiny recorder so a completed run still
                // leaves worker.log/worker.exitcode behind, just like the
                // detached mode (§4.4 "log recorder that writes two sibling
                // files").
                let recorded = format!(
                    "{command_line} >{log} 2>&1; echo $? >{code}",
                    log = shell_quote(&log_path),
                    code = shell_quote(&exitcode_path),
                );
                let tmux_session = self.sessions.spawn(name, &req.cwd, &recorded, &req.env).await?;
                Ok(ExecutionHandle {
                    tmux_session: Some(tmux_session),
                    pid: None,
                    prompt_path,
                    log_path,
                    exitcode_path,
                })
            }
            None => {
                let log_file = std::fs::File::create(&log_path)?;
                let log_file_stderr = log_file.try_clone()?;

                let mut cmd = tokio::process::Command::new("sh");
                cmd.arg("-c")
                    .arg(&command_line)
                    .current_dir(&req.cwd)
                    .stdin(Stdio::null())
                    .stdout(log_file)
                    .stderr(log_file_stderr);
                for (key, value) in &req.env {
                    cmd.env(key, value);
                }

                let mut child = cmd.spawn()?;
                let pid = child.id();
                let exitcode_path_for_task = exitcode_path.clone();
                tokio::spawn(async move {
                    if let Ok(status) = child.wait().await {
                        let code = status.code().unwrap_or(-1);
                        let _ =
                            tokio::fs::write(&exitcode_path_for_task, format!("{code}\n")).await;
                    }
                });

                Ok(ExecutionHandle {
                    tmux_session: None,
                    pid,
                    prompt_path,
                    log_path,
                    exitcode_path,
                })
            }
        }
    }
}

/// Poll for the completion of a previously started invocation (§4.4
/// "completion detection"). Checks for the exit-code file once a second;
/// if the multiplexer session disappears first, grants one extra second
/// before reporting `sessionDied`. Always bounded by `timeout`.
pub async fn poll_completion<S: SessionAdapter>(
    sessions: &S,
    handle: &ExecutionHandle,
    timeout: Duration,
) -> CompletionOutcome {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if exit_code_file_exists(&handle.exitcode_path).await {
            return CompletionOutcome::Found;
        }

        if let Some(tmux_session) = &handle.tmux_session {
            if !sessions.is_alive(tmux_session).await.unwrap_or(false) {
                tokio::time::sleep(COMPLETION_POLL_INTERVAL).await;
                return if exit_code_file_exists(&handle.exitcode_path).await {
                    CompletionOutcome::Found
                } else {
                    CompletionOutcome::SessionDied
                };
            }
        }

        if tokio::time::Instant::now() >= deadline {
            return CompletionOutcome::TimedOut;
        }
        tokio::time::sleep(COMPLETION_POLL_INTERVAL).await;
    }
}

async fn exit_code_file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn build_fresh_command_line(kind: AgentKind, req: &ExecuteRequest, prompt_path: &Path) -> String {
    let mut parts = vec![binary_name(kind).to_string()];
    if kind.requires_pregenerated_session_id() {
        if let Some(session_id) = &req.session_id {
            parts.push("--session-id".to_string());
            parts.push(session_id.clone());
        }
    }
    append_model_and_prompt(&mut parts, req, prompt_path);
    parts.join(" ")
}

fn append_model_and_prompt(parts: &mut Vec<String>, req: &ExecuteRequest, prompt_path: &Path) {
    if let Some(model) = &req.model {
        parts.push("--model".to_string());
        parts.push(model.clone());
    }
    parts.push(format!("\"$(cat {})\"", shell_quote(prompt_path)));
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "assistant_tests.rs"]
mod tests;
