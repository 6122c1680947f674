// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::bridge::{OutboundBridge, RegisteredBridge};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use wharf_core::{Action, ActionPayload, ActionTarget, FakeClock};

struct ScriptedOutbound {
    name: String,
    targets: Vec<String>,
    results: Mutex<VecDeque<ActionResult>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedOutbound {
    fn new(name: &str, targets: &[&str], results: Vec<ActionResult>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
            results: Mutex::new(results.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl OutboundBridge for ScriptedOutbound {
    fn name(&self) -> &str {
        &self.name
    }

    fn targets(&self) -> &[String] {
        &self.targets
    }

    async fn actions(&self, _ctx: &BridgeContext, action: &Action) -> ActionResult {
        self.calls.lock().unwrap().push(action.id.as_str().to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ActionResult::ok(Vec::new()))
    }
}

fn action_line(id: &str, target: &str, offset_seed: u64) -> RecordLine {
    let clock = FakeClock::new(offset_seed);
    let action = Action::respond(
        id,
        ActionTarget {
            target: target.to_string(),
            token: None,
        },
        ActionPayload::Comment {
            body: "hi".to_string(),
        },
    );
    let record = BusRecord::action(&clock, action);
    let len = serde_json::to_string(&record).unwrap().len() as u64 + 1;
    RecordLine {
        record: Some(record),
        len,
    }
}

fn ctx() -> BridgeContext {
    BridgeContext {
        repo_root: PathBuf::from("/tmp/repo"),
        worktree: None,
        plan_id: None,
    }
}

#[tokio::test]
async fn delivers_action_and_advances_offset() {
    let mut registry = BridgeRegistry::new();
    let bridge = ScriptedOutbound::new("github", &["pr:1"], vec![ActionResult::ok(vec!["c-1".into()])]);
    registry
        .register(RegisteredBridge::Outbound(bridge.clone()))
        .unwrap();

    let lines = vec![action_line("act-1", "pr:1", 0)];
    let expected_len = lines[0].len;
    let mut states = HashMap::new();
    let clock = FakeClock::new(1_700_000_000_000);

    let result = route_actions(lines, 0, &registry, &mut states, &clock, &ctx()).await;

    assert_eq!(result.new_offset, expected_len);
    assert!(!result.halted);
    assert_eq!(result.routed.len(), 1);
    assert_eq!(result.routed[0].outcome, RouteOutcome::Delivered);
    assert!(states.get("github").unwrap().is_delivered("act-1"));
}

#[tokio::test]
async fn skips_idempotent_replay_without_redelivering() {
    let mut registry = BridgeRegistry::new();
    let bridge = ScriptedOutbound::new(
        "github",
        &["pr:1"],
        vec![ActionResult::ok(vec![]), ActionResult::ok(vec![])],
    );
    registry
        .register(RegisteredBridge::Outbound(bridge.clone()))
        .unwrap();

    let mut states = HashMap::new();
    let clock = FakeClock::new(0);

    let first = route_actions(
        vec![action_line("act-1", "pr:1", 0)],
        0,
        &registry,
        &mut states,
        &clock,
        &ctx(),
    )
    .await;
    assert_eq!(first.routed[0].outcome, RouteOutcome::Delivered);

    let second = route_actions(
        vec![action_line("act-1", "pr:1", 0)],
        first.new_offset,
        &registry,
        &mut states,
        &clock,
        &ctx(),
    )
    .await;
    assert_eq!(second.routed[0].outcome, RouteOutcome::SkippedIdempotent);
    assert_eq!(bridge.call_count(), 1, "idempotent replay must not call the bridge again");
}

#[tokio::test]
async fn halts_batch_on_retryable_failure_preserving_order() {
    let mut registry = BridgeRegistry::new();
    let bridge = ScriptedOutbound::new(
        "github",
        &["pr:1"],
        vec![ActionResult::failed("rate limited", true)],
    );
    registry
        .register(RegisteredBridge::Outbound(bridge))
        .unwrap();

    let lines = vec![
        action_line("act-1", "pr:1", 0),
        action_line("act-2", "pr:1", 1),
    ];
    let mut states = HashMap::new();
    let clock = FakeClock::new(0);

    let result = route_actions(lines, 0, &registry, &mut states, &clock, &ctx()).await;

    assert!(result.halted);
    assert_eq!(result.new_offset, 0, "offset must not advance past the retryable failure");
    assert!(result.routed.is_empty());
}

#[tokio::test]
async fn logs_and_advances_past_non_retryable_failure() {
    let mut registry = BridgeRegistry::new();
    let bridge = ScriptedOutbound::new(
        "github",
        &["pr:1"],
        vec![ActionResult::failed("pull request not found", false)],
    );
    registry
        .register(RegisteredBridge::Outbound(bridge))
        .unwrap();

    let lines = vec![action_line("act-1", "pr:1", 0)];
    let expected_len = lines[0].len;
    let mut states = HashMap::new();
    let clock = FakeClock::new(0);

    let result = route_actions(lines, 0, &registry, &mut states, &clock, &ctx()).await;

    assert!(!result.halted);
    assert_eq!(result.new_offset, expected_len);
    assert!(matches!(
        &result.routed[0].outcome,
        RouteOutcome::FailedNonRetryable { message } if message == "pull request not found"
    ));
}

#[tokio::test]
async fn advances_past_a_malformed_line_without_losing_byte_alignment() {
    let mut registry = BridgeRegistry::new();
    let bridge = ScriptedOutbound::new("github", &["pr:1"], vec![ActionResult::ok(vec![])]);
    registry
        .register(RegisteredBridge::Outbound(bridge.clone()))
        .unwrap();

    let malformed = RecordLine { record: None, len: 17 };
    let good = action_line("act-1", "pr:1", 0);
    let expected_len = malformed.len + good.len;

    let result = route_actions(vec![malformed, good], 0, &registry, &mut HashMap::new(), &FakeClock::new(0), &ctx()).await;

    assert_eq!(result.new_offset, expected_len);
    assert_eq!(result.routed.len(), 1);
    assert_eq!(result.routed[0].outcome, RouteOutcome::Delivered);
    assert_eq!(bridge.call_count(), 1);
}

#[tokio::test]
async fn skips_action_with_no_owning_bridge() {
    let registry = BridgeRegistry::new();
    let lines = vec![action_line("act-1", "pr:unknown", 0)];
    let expected_len = lines[0].len;
    let mut states = HashMap::new();
    let clock = FakeClock::new(0);

    let result = route_actions(lines, 0, &registry, &mut states, &clock, &ctx()).await;

    assert_eq!(result.new_offset, expected_len);
    assert_eq!(result.routed[0].outcome, RouteOutcome::SkippedNoBridge);
}
