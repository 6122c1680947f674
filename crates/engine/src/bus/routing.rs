// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The outbound action routing contract: for each pending action, find the
//! bridge that owns its target, skip idempotent replays, and deliver.
//! A retryable failure halts the rest of the batch so ordering is
//! preserved; a non-retryable one is logged and skipped.

use std::collections::HashMap;

use wharf_core::Clock;

use super::bridge::{ActionResult, BridgeContext, BridgeRegistry};
use super::bridge_state::{BridgeActionState, DeliveryReceipt};
use super::record::RecordLine;
use super::BusRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Delivered,
    SkippedIdempotent,
    SkippedNoBridge,
    FailedNonRetryable { message: String },
}

#[derive(Debug, Clone)]
pub struct RoutedAction {
    pub action_id: String,
    pub outcome: RouteOutcome,
}

pub struct RoutingResult {
    pub new_offset: u64,
    pub routed: Vec<RoutedAction>,
    /// `true` if the batch stopped early on a retryable failure; later
    /// actions in `lines` were not attempted and remain unconsumed at
    /// `new_offset`.
    pub halted: bool,
}

/// Route every action in `lines` (already read from `since_offset`)
/// through `registry`, mutating `bridge_states` in place with delivery
/// receipts. Returns the offset the caller should persist next.
pub async fn route_actions(
    lines: Vec<RecordLine>,
    since_offset: u64,
    registry: &BridgeRegistry,
    bridge_states: &mut HashMap<String, BridgeActionState>,
    clock: &impl Clock,
    ctx: &BridgeContext,
) -> RoutingResult {
    let mut offset = since_offset;
    let mut routed = Vec::new();
    let mut halted = false;

    for line in lines {
        let Some(BusRecord::Action { data: action, .. }) = line.record else {
            offset += line.len;
            continue;
        };

        let Some(bridge) = registry.resolve_target(&action.target.target) else {
            routed.push(RoutedAction {
                action_id: action.id.as_str().to_string(),
                outcome: RouteOutcome::SkippedNoBridge,
            });
            offset += line.len;
            continue;
        };

        let bridge_name = bridge.name().to_string();
        let state = bridge_states.entry(bridge_name.clone()).or_default();

        if state.is_delivered(action.id.as_str()) {
            routed.push(RoutedAction {
                action_id: action.id.as_str().to_string(),
                outcome: RouteOutcome::SkippedIdempotent,
            });
            offset += line.len;
            continue;
        }

        let result: ActionResult = bridge.actions(ctx, &action).await;

        if result.success {
            state.record_delivery(
                action.id.as_str().to_string(),
                DeliveryReceipt {
                    delivered_at: wharf_core::epoch_ms_to_rfc3339(clock.epoch_ms()),
                    external_artifact_ids: result.external_artifact_ids,
                },
            );
            routed.push(RoutedAction {
                action_id: action.id.as_str().to_string(),
                outcome: RouteOutcome::Delivered,
            });
            offset += line.len;
            continue;
        }

        if result.retryable {
            halted = true;
            break;
        }

        routed.push(RoutedAction {
            action_id: action.id.as_str().to_string(),
            outcome: RouteOutcome::FailedNonRetryable {
                message: result.error.unwrap_or_default(),
            },
        });
        offset += line.len;
    }

    RoutingResult {
        new_offset: offset,
        routed,
        halted,
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
