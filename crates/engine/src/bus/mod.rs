// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The file bus: append-only JSONL events/actions per workspace (and
//! repo-globally), byte-offset cursors, the bridge registry, and the
//! outbound action routing contract.

mod bridge;
mod bridge_state;
mod command_bridge;
mod dispatcher_state;
mod record;
mod routing;

pub use bridge::{
    ActionResult, BridgeContext, BridgeError, BridgeRegistry, InboundBridge, InboundPoll,
    OutboundBridge, RegisteredBridge, classify_retryable,
};
pub use command_bridge::{bridges_from_config, CommandBridge};
pub use bridge_state::{BridgeActionState, BridgeStateError, DeliveryReceipt};
pub use dispatcher_state::{DispatcherState, DispatcherStateError, PROCESSED_EVENT_ID_RING_SIZE};
pub use record::{append, read_lines_since, read_since, BusError, BusRecord, CursorRead, RecordLine};
pub use routing::{route_actions, RouteOutcome, RoutedAction, RoutingResult};
