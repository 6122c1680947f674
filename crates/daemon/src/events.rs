// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process pub/sub of plan status snapshots (§2 component J). A
//! consumer (a UI, a CLI `watch` command) is explicitly out of scope; this
//! only needs to exist so one can be bolted on without touching the
//! dispatcher.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A point-in-time view of one plan's scheduler-visible state, published
/// after every tick that touches it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub status: String,
    pub blocked: bool,
    #[serde(rename = "lastError")]
    pub last_error: Option<String>,
    pub ts: String,
}

/// Thin wrapper over a broadcast channel. Cloning shares the same
/// underlying channel; a publish with no subscribers is simply dropped.
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<StatusSnapshot>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.sender.subscribe()
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        let _ = self.sender.send(snapshot);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
