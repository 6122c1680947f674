// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrapper for consistent observability around the
//! multiplexer session adapter. Invocation-level tracing for the assistant
//! adapter itself lives directly on [`crate::agent::AssistantAdapter`],
//! since that type is generic over `S: SessionAdapter` rather than a trait
//! object a wrapper could delegate to.

use crate::session::{SessionAdapter, SessionError};
use async_trait::async_trait;
use std::path::Path;
use tracing::Instrument;

/// Wrapper that adds tracing to any SessionAdapter
#[derive(Clone)]
pub struct TracedSession<S> {
    inner: S,
}

impl<S> TracedSession<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: SessionAdapter> SessionAdapter for TracedSession<S> {
    async fn spawn(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
    ) -> Result<String, SessionError> {
        async {
            tracing::info!(cmd, env_count = env.len(), "starting");
            let start = std::time::Instant::now();
            let result = self.inner.spawn(name, cwd, cmd, env).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(id) => tracing::info!(session_id = id.as_str(), elapsed_ms, "session created"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "spawn failed"),
            }
            result
        }
        .instrument(tracing::info_span!("session.spawn", name, cwd = %cwd.display()))
        .await
    }

    async fn send(&self, id: &str, input: &str) -> Result<(), SessionError> {
        tracing::info_span!("session.send", id)
            .in_scope(|| tracing::debug!(input_len = input.len(), "sending"));
        let result = self.inner.send(id, input).await;
        if let Err(ref e) = result {
            tracing::error!(error = %e, "send failed");
        }
        result
    }

    async fn send_literal(&self, id: &str, text: &str) -> Result<(), SessionError> {
        let result = self.inner.send_literal(id, text).await;
        if let Err(ref e) = result {
            tracing::error!(id, error = %e, "send_literal failed");
        }
        result
    }

    async fn send_enter(&self, id: &str) -> Result<(), SessionError> {
        let result = self.inner.send_enter(id).await;
        if let Err(ref e) = result {
            tracing::error!(id, error = %e, "send_enter failed");
        }
        result
    }

    async fn kill(&self, id: &str) -> Result<(), SessionError> {
        let result = self.inner.kill(id).await;
        tracing::info_span!("session.kill", id).in_scope(|| match &result {
            Ok(()) => tracing::info!("killed"),
            Err(e) => tracing::warn!(error = %e, "kill failed (may be expected)"),
        });
        result
    }

    async fn is_alive(&self, id: &str) -> Result<bool, SessionError> {
        let result = self.inner.is_alive(id).await;
        tracing::trace!(id, alive = ?result.as_ref().ok(), "checked");
        result
    }

    async fn capture_output(&self, id: &str, lines: u32) -> Result<String, SessionError> {
        let result = self.inner.capture_output(id, lines).await;
        tracing::info_span!("session.capture", id, lines).in_scope(|| {
            tracing::debug!(
                captured_len = result.as_ref().map(|s| s.len()).ok(),
                "captured"
            )
        });
        result
    }

    async fn is_process_running(&self, id: &str, pattern: &str) -> Result<bool, SessionError> {
        self.inner.is_process_running(id, pattern).await
    }

    async fn get_exit_code(&self, id: &str) -> Result<Option<i32>, SessionError> {
        self.inner.get_exit_code(id).await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
