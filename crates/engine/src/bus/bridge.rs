// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridges: plug-ins that poll an external system into bus events
//! (`InboundBridge`), deliver bus actions outward (`OutboundBridge`), or
//! both (`FullBridge`). The registry is the exclusive owner of every
//! target an outbound bridge claims.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use thiserror::Error;
use wharf_core::{Action, Event};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("a bridge named {name:?} is already registered")]
    DuplicateName { name: String },
    #[error("target {target:?} is already claimed by bridge {owner:?}")]
    TargetAlreadyClaimed { target: String, owner: String },
    #[error("bridge {name} poll failed: {message}")]
    Poll { name: String, message: String },
}

/// What an `advanceOne` tick needs to hand a bridge so it can talk to the
/// outside world and to this plan's workspace.
#[derive(Debug, Clone)]
pub struct BridgeContext {
    pub repo_root: PathBuf,
    pub worktree: Option<PathBuf>,
    pub plan_id: Option<String>,
}

/// Outcome of one `InboundBridge::events` poll: the events produced plus
/// the bridge's own opaque next-poll state (cursor, pagination token, …).
pub struct InboundPoll {
    pub events: Vec<Event>,
    pub state: serde_json::Value,
}

#[async_trait]
pub trait InboundBridge: Send + Sync {
    fn name(&self) -> &str;
    async fn events(
        &self,
        ctx: &BridgeContext,
        state: serde_json::Value,
    ) -> Result<InboundPoll, BridgeError>;
}

/// Result of delivering one action through `OutboundBridge::actions`.
#[derive(Debug, Clone, Default)]
pub struct ActionResult {
    pub success: bool,
    pub retryable: bool,
    pub external_artifact_ids: Vec<String>,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn ok(external_artifact_ids: Vec<String>) -> Self {
        Self {
            success: true,
            retryable: false,
            external_artifact_ids,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            retryable,
            external_artifact_ids: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[async_trait]
pub trait OutboundBridge: Send + Sync {
    fn name(&self) -> &str;
    fn targets(&self) -> &[String];
    async fn actions(&self, ctx: &BridgeContext, action: &Action) -> ActionResult;
}

/// A registered bridge's capability set.
pub enum RegisteredBridge {
    Inbound(Arc<dyn InboundBridge>),
    Outbound(Arc<dyn OutboundBridge>),
    Full {
        inbound: Arc<dyn InboundBridge>,
        outbound: Arc<dyn OutboundBridge>,
    },
}

impl RegisteredBridge {
    pub fn name(&self) -> &str {
        match self {
            RegisteredBridge::Inbound(b) => b.name(),
            RegisteredBridge::Outbound(b) => b.name(),
            RegisteredBridge::Full { inbound, .. } => inbound.name(),
        }
    }

    pub fn as_inbound(&self) -> Option<&Arc<dyn InboundBridge>> {
        match self {
            RegisteredBridge::Inbound(b) => Some(b),
            RegisteredBridge::Outbound(_) => None,
            RegisteredBridge::Full { inbound, .. } => Some(inbound),
        }
    }

    pub fn as_outbound(&self) -> Option<&Arc<dyn OutboundBridge>> {
        match self {
            RegisteredBridge::Inbound(_) => None,
            RegisteredBridge::Outbound(b) => Some(b),
            RegisteredBridge::Full { outbound, .. } => Some(outbound),
        }
    }
}

/// Owns every registered bridge and the exclusive claim each outbound
/// bridge holds on its targets. Registration order is preserved so inbound
/// polling happens in a stable, configured order each tick.
#[derive(Default)]
pub struct BridgeRegistry {
    bridges: IndexMap<String, RegisteredBridge>,
    target_owners: HashMap<String, String>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, bridge: RegisteredBridge) -> Result<(), BridgeError> {
        let name = bridge.name().to_string();
        if self.bridges.contains_key(&name) {
            return Err(BridgeError::DuplicateName { name });
        }
        if let Some(outbound) = bridge.as_outbound() {
            for target in outbound.targets() {
                if let Some(owner) = self.target_owners.get(target) {
                    return Err(BridgeError::TargetAlreadyClaimed {
                        target: target.clone(),
                        owner: owner.clone(),
                    });
                }
            }
            for target in outbound.targets() {
                self.target_owners.insert(target.clone(), name.clone());
            }
        }
        self.bridges.insert(name, bridge);
        Ok(())
    }

    pub fn inbound_bridges(&self) -> impl Iterator<Item = &Arc<dyn InboundBridge>> {
        self.bridges.values().filter_map(RegisteredBridge::as_inbound)
    }

    /// Every registered bridge's name, in registration order. Used to load
    /// each bridge's persisted delivery/cursor state before a tick touches
    /// it, rather than defaulting a bridge's idempotency record to empty.
    pub fn bridge_names(&self) -> impl Iterator<Item = &str> {
        self.bridges.keys().map(String::as_str)
    }

    /// The bridge that owns `target`, if any.
    pub fn resolve_target(&self, target: &str) -> Option<&Arc<dyn OutboundBridge>> {
        let owner = self.target_owners.get(target)?;
        self.bridges.get(owner).and_then(RegisteredBridge::as_outbound)
    }

    /// Looks up a registered bridge by its own name, independent of any
    /// target it may own. Used to hand a specific configured bridge to a
    /// `PlatformReviewProvider` rather than a target-addressed action.
    pub fn get(&self, name: &str) -> Option<&RegisteredBridge> {
        self.bridges.get(name)
    }
}

/// Derives retryability from error text: rate-limit, connection-refused,
/// and timeout markers are treated as transient.
pub fn classify_retryable(message: &str) -> bool {
    let lowered = message.to_lowercase();
    const MARKERS: &[&str] = &[
        "rate limit",
        "rate-limit",
        "ratelimit",
        "429",
        "connection refused",
        "connection reset",
        "timed out",
        "timeout",
    ];
    MARKERS.iter().any(|marker| lowered.contains(marker))
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
