// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-assistant binary names, resume syntax, and session-id extraction
//! (§4.4's session identity table). One shared line-oriented parser handles
//! both live stdout and a completed `worker.log`.

use wharf_core::AgentKind;

pub fn binary_name(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Codex => "codex",
        AgentKind::Opencode => "opencode",
        AgentKind::Claude => "claude",
        AgentKind::Gemini => "gemini",
        AgentKind::Amp => "amp",
        AgentKind::Manual => "",
    }
}

/// The argument vector (after the binary name) that resumes an existing
/// session, per the per-assistant resume syntax.
pub fn resume_args(kind: AgentKind, session_id: &str) -> Vec<String> {
    match kind {
        AgentKind::Opencode => vec!["--session".to_string(), session_id.to_string()],
        AgentKind::Codex => vec![
            "exec".to_string(),
            "resume".to_string(),
            session_id.to_string(),
        ],
        AgentKind::Claude => vec!["--resume".to_string(), session_id.to_string()],
        AgentKind::Gemini => vec!["--resume".to_string(), session_id.to_string()],
        AgentKind::Amp => vec!["threads".to_string(), "continue".to_string()],
        AgentKind::Manual => Vec::new(),
    }
}

/// Parse `output` (partial stdout or a finished log file) for the session
/// id the assistant reported, per its own wire protocol. `claude` never
/// reports one here since its id is pre-generated and passed in; `manual`
/// has no subprocess at all.
pub fn extract_session_id(kind: AgentKind, output: &str) -> Option<String> {
    match kind {
        AgentKind::Opencode => find_json_field(output, "sessionID"),
        AgentKind::Codex => find_json_event_field(output, "thread.started", "thread_id"),
        AgentKind::Gemini => find_json_event_field(output, "init", "session_id"),
        AgentKind::Amp => find_json_field(output, "session_id"),
        AgentKind::Claude | AgentKind::Manual => None,
    }
}

fn find_json_field(output: &str, field: &str) -> Option<String> {
    json_lines(output).find_map(|value| value.get(field)?.as_str().map(str::to_string))
}

fn find_json_event_field(output: &str, event_type: &str, field: &str) -> Option<String> {
    json_lines(output).find_map(|value| {
        if value.get("type")?.as_str()? != event_type {
            return None;
        }
        value.get(field)?.as_str().map(str::to_string)
    })
}

fn json_lines(output: &str) -> impl Iterator<Item = serde_json::Value> + '_ {
    output
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str(line).ok())
}

#[cfg(test)]
#[path = "session_id_tests.rs"]
mod tests;
