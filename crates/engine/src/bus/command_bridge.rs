// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in bridge kind: an external command, invoked opaquely and
//! speaking JSON on stdout/stdin, per §1's "concrete wire protocols of
//! external hosting platforms... treated as opaque commands and JSON line
//! streams". One `CommandBridge` per configured `bridges.<name>` entry
//! whose `kind` is `"command"`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use wharf_adapters::subprocess::run_with_timeout;
use wharf_storage::BridgeConfig;

use super::bridge::{
    ActionResult, BridgeContext, BridgeError, BridgeRegistry, InboundBridge, InboundPoll,
    OutboundBridge, RegisteredBridge,
};
use wharf_core::Action;

const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct EventsInvocation<'a> {
    repo_root: &'a str,
    worktree: Option<&'a str>,
    plan_id: Option<&'a str>,
    state: serde_json::Value,
}

#[derive(Deserialize)]
struct EventsReply {
    #[serde(default)]
    events: Vec<wharf_core::Event>,
    #[serde(default)]
    state: serde_json::Value,
}

#[derive(Serialize)]
struct ActionInvocation<'a> {
    repo_root: &'a str,
    worktree: Option<&'a str>,
    plan_id: Option<&'a str>,
    action: &'a Action,
}

#[derive(Deserialize)]
struct ActionReply {
    success: bool,
    #[serde(default)]
    retryable: bool,
    #[serde(default)]
    external_artifact_ids: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// A bridge whose inbound/outbound behavior is delegated to one external
/// command. Invoked as `<command> <args...> events|actions <json line>`,
/// with a single JSON object written to stdout as the reply. The core
/// never parses the bridge's own wire format; it only speaks this
/// envelope, matching §1's scoping of concrete platform protocols out of
/// this crate.
pub struct CommandBridge {
    name: String,
    command: String,
    args: Vec<String>,
    targets: Vec<String>,
    timeout: Duration,
}

impl CommandBridge {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            targets: Vec::new(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Outbound targets this bridge claims exclusively (see
    /// `BridgeRegistry::register`'s target-uniqueness check).
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args);
        cmd
    }
}

#[async_trait]
impl InboundBridge for CommandBridge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn events(
        &self,
        ctx: &BridgeContext,
        state: serde_json::Value,
    ) -> Result<InboundPoll, BridgeError> {
        let invocation = EventsInvocation {
            repo_root: &ctx.repo_root.to_string_lossy(),
            worktree: ctx.worktree.as_ref().map(|w| w.to_str().unwrap_or_default()),
            plan_id: ctx.plan_id.as_deref(),
            state,
        };
        let line = serde_json::to_string(&invocation).map_err(|err| BridgeError::Poll {
            name: self.name.clone(),
            message: format!("failed to encode events invocation: {err}"),
        })?;

        let mut cmd = self.base_command();
        cmd.arg("events").arg(line);
        let output = run_with_timeout(cmd, self.timeout, &format!("bridge {} events", self.name))
            .await
            .map_err(|message| BridgeError::Poll {
                name: self.name.clone(),
                message,
            })?;
        if !output.status.success() {
            return Err(BridgeError::Poll {
                name: self.name.clone(),
                message: format!(
                    "exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        let reply: EventsReply = serde_json::from_slice(&output.stdout).map_err(|err| BridgeError::Poll {
            name: self.name.clone(),
            message: format!("malformed events reply: {err}"),
        })?;
        Ok(InboundPoll {
            events: reply.events,
            state: reply.state,
        })
    }
}

#[async_trait]
impl OutboundBridge for CommandBridge {
    fn name(&self) -> &str {
        &self.name
    }

    fn targets(&self) -> &[String] {
        &self.targets
    }

    async fn actions(&self, ctx: &BridgeContext, action: &Action) -> ActionResult {
        let invocation = ActionInvocation {
            repo_root: &ctx.repo_root.to_string_lossy(),
            worktree: ctx.worktree.as_ref().map(|w| w.to_str().unwrap_or_default()),
            plan_id: ctx.plan_id.as_deref(),
            action,
        };
        let line = match serde_json::to_string(&invocation) {
            Ok(line) => line,
            Err(err) => return ActionResult::failed(format!("failed to encode action: {err}"), false),
        };

        let mut cmd = self.base_command();
        cmd.arg("actions").arg(line);
        let output = match run_with_timeout(cmd, self.timeout, &format!("bridge {} actions", self.name)).await {
            Ok(output) => output,
            Err(message) => return ActionResult::failed(message, true),
        };
        if !output.status.success() {
            return ActionResult::failed(
                format!(
                    "exited with {:?}: {}",
                    output.status.code(),
                    String::from_utf8_lossy(&output.stderr)
                ),
                false,
            );
        }

        match serde_json::from_slice::<ActionReply>(&output.stdout) {
            Ok(reply) => ActionResult {
                success: reply.success,
                retryable: reply.retryable,
                external_artifact_ids: reply.external_artifact_ids,
                error: reply.error,
            },
            Err(err) => ActionResult::failed(format!("malformed action reply: {err}"), false),
        }
    }
}

/// Builds the registry `wharfd` runs with, one `CommandBridge` per
/// `config.bridges` entry of kind `"command"` whose `enabled` setting
/// (default true) isn't `false`. Other `kind` values have no built-in
/// implementation and are skipped, the same as a disabled bridge.
pub fn bridges_from_config(bridges: &HashMap<String, BridgeConfig>) -> Result<BridgeRegistry, BridgeError> {
    let mut registry = BridgeRegistry::new();
    for (name, cfg) in bridges {
        let enabled = cfg
            .settings
            .get("enabled")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true);
        if !enabled || cfg.kind != "command" {
            continue;
        }
        let Some(command) = cfg.command.clone() else {
            continue;
        };
        let targets = cfg
            .settings
            .get("targets")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let bridge = Arc::new(CommandBridge::new(name.clone(), command, cfg.args.clone()).with_targets(targets));
        registry.register(RegisteredBridge::Full {
            inbound: bridge.clone(),
            outbound: bridge,
        })?;
    }
    Ok(registry)
}

#[cfg(test)]
#[path = "command_bridge_tests.rs"]
mod tests;
