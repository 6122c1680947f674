// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus event type (§4.5). An `Event` is produced by an inbound bridge, a
//! review provider, or a hook, and is the unit triage reasons about.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    pub struct EventId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Where an outbound action should be routed if one is produced in reply
/// to this event (e.g. "reply on this PR review thread").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyTarget {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub source: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "replyTo")]
    pub reply_to: Option<ReplyTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl Event {
    pub fn new(
        id: impl Into<EventId>,
        source: impl Into<String>,
        event_type: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            event_type: event_type.into(),
            severity,
            title: title.into(),
            body: body.into(),
            reply_to: None,
            context: None,
        }
    }

    pub fn with_reply_to(mut self, target: ReplyTarget) -> Self {
        self.reply_to = Some(target);
        self
    }

    /// Short, single-line summary for structured logging.
    pub fn log_summary(&self) -> String {
        format!(
            "{}:{} [{:?}] {}",
            self.source, self.event_type, self.severity, self.title
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
