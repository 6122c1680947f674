// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The set of assistant implementations the agent adapter can drive, and the
//! shared vocabulary for describing how an invocation ended.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which external assistant CLI a plan is configured to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Codex,
    Opencode,
    Claude,
    Gemini,
    Amp,
    /// No subprocess is spawned; the operator works in their own IDE and
    /// marks checklist items done by hand.
    Manual,
}

impl AgentKind {
    /// Whether this assistant pre-generates its own session id (claude) vs.
    /// relying entirely on parsing the CLI's own output.
    pub fn requires_pregenerated_session_id(self) -> bool {
        matches!(self, AgentKind::Claude)
    }

    /// Whether a pre-generated session id is merely an optional fallback
    /// (amp) rather than unused.
    pub fn accepts_pregenerated_session_id_as_fallback(self) -> bool {
        matches!(self, AgentKind::Claude | AgentKind::Amp)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentKind::Codex => "codex",
            AgentKind::Opencode => "opencode",
            AgentKind::Claude => "claude",
            AgentKind::Gemini => "gemini",
            AgentKind::Amp => "amp",
            AgentKind::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AgentKind {
    type Err = AgentKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "codex" => Ok(AgentKind::Codex),
            "opencode" => Ok(AgentKind::Opencode),
            "claude" => Ok(AgentKind::Claude),
            "gemini" => Ok(AgentKind::Gemini),
            "amp" => Ok(AgentKind::Amp),
            "manual" => Ok(AgentKind::Manual),
            other => Err(AgentKindParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown agent kind: {0}")]
pub struct AgentKindParseError(pub String);

/// Outcome of waiting for a detached subprocess invocation to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// The exit-code file appeared; the invocation ran to completion.
    Found,
    /// The wall-clock timeout elapsed with no exit-code file.
    TimedOut,
    /// The multiplexer session disappeared without producing an exit code.
    SessionDied,
}

impl fmt::Display for CompletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompletionOutcome::Found => "found",
            CompletionOutcome::TimedOut => "timed_out",
            CompletionOutcome::SessionDied => "session_died",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
