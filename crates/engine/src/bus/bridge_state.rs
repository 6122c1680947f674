// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-bridge, per-workspace delivery state: `bridge.<name>.json` holds the
//! inbound poll cursor a bridge owns; `bridge.<name>.actions.json` holds the
//! `deliveredActions` idempotency record an outbound bridge checks before
//! redelivering an action.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wharf_storage::write_atomic;

#[derive(Debug, Error)]
pub enum BridgeStateError {
    #[error("failed to read bridge state {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed bridge state {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A single delivery receipt: when an action was delivered and any
/// identifiers the external system assigned it (a comment id, a review
/// id, …).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(rename = "deliveredAt")]
    pub delivered_at: String,
    #[serde(default, rename = "externalArtifactIds")]
    pub external_artifact_ids: Vec<String>,
}

/// `deliveredActions: map<actionId, receipt>` for one bridge, scoped to
/// one workspace's bus state directory.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BridgeActionState {
    #[serde(default, rename = "deliveredActions")]
    delivered_actions: HashMap<String, DeliveryReceipt>,
}

impl BridgeActionState {
    pub fn path(bus_state_dir: &Path, bridge_name: &str) -> PathBuf {
        bus_state_dir.join(format!("bridge.{bridge_name}.actions.json"))
    }

    pub fn load(path: &Path) -> Result<Self, BridgeStateError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|source| BridgeStateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| BridgeStateError::Json {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), BridgeStateError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(|source| BridgeStateError::Json {
            path: path.display().to_string(),
            source,
        })?;
        write_atomic(path, &bytes).map_err(|source| BridgeStateError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn is_delivered(&self, action_id: &str) -> bool {
        self.delivered_actions.contains_key(action_id)
    }

    pub fn record_delivery(&mut self, action_id: impl Into<String>, receipt: DeliveryReceipt) {
        self.delivered_actions.insert(action_id.into(), receipt);
    }
}

#[cfg(test)]
#[path = "bridge_state_tests.rs"]
mod tests;
