// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bus action type (§4.5). An `Action` is appended by a hook (via
//! `ctx.emitAction`) or directly by the dispatcher, and is delivered
//! outward by whichever bridge owns its target.

use crate::event::EventId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    pub struct ActionId;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// The built-in payload variants a platform bridge recognizes. Unknown
/// variants still round-trip (the sum is open per §4.5) via `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionPayload {
    Comment {
        body: String,
    },
    InlineComment {
        body: String,
        file: String,
        line: u32,
        side: InlineSide,
    },
    Review {
        body: String,
        #[serde(default)]
        event: ReviewVerdict,
    },
    RequestReviewers {
        reviewers: Vec<String>,
    },
    Merge {
        #[serde(default)]
        method: MergeMethod,
    },
    ClosePr,
    AddLabels {
        labels: Vec<String>,
    },
    RemoveLabels {
        labels: Vec<String>,
    },
    AssignUsers {
        users: Vec<String>,
    },
    SetMilestone {
        milestone: String,
    },
    /// Anything a custom bridge defines that the core does not know about.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    #[default]
    Comment,
    Approve,
    RequestChanges,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    #[serde(rename = "type")]
    pub action_type: ActionKind,
    pub target: ActionTarget,
    pub payload: ActionPayload,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "relatedEventId"
    )]
    pub related_event_id: Option<EventId>,
}

/// Only one action kind exists today ("respond"); kept as an enum (rather
/// than a string constant) so a future second kind is a non-breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Respond,
}

impl Action {
    pub fn respond(
        id: impl Into<ActionId>,
        target: ActionTarget,
        payload: ActionPayload,
    ) -> Self {
        Self {
            id: id.into(),
            action_type: ActionKind::Respond,
            target,
            payload,
            related_event_id: None,
        }
    }

    pub fn in_reply_to(mut self, event_id: EventId) -> Self {
        self.related_event_id = Some(event_id);
        self
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
