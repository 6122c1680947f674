// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The repo-local `state.json` (§4.1): `{control_cursor, plans}`. The state
//! store is the only component allowed to overwrite a `PlanState` (§3
//! "Ownership").

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wharf_core::{PlanId, PlanState};

use crate::atomic::write_atomic;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed state file {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk shape, including the legacy top-level `inbox` map (§4.1 "Legacy
/// top-level `inbox` maps in older `state.json` files are folded into
/// `plans` on load").
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawState {
    #[serde(default)]
    control_cursor: u64,
    #[serde(default)]
    plans: IndexMap<PlanId, PlanState>,
    #[serde(default)]
    inbox: IndexMap<PlanId, PlanState>,
}

/// The full, in-memory `State` the dispatcher mutates each tick.
/// `plans` is an [`IndexMap`] because the dispatcher advances plans in
/// insertion order every tick (§4.8).
#[derive(Debug, Default, Clone)]
pub struct State {
    pub control_cursor: u64,
    pub plans: IndexMap<PlanId, PlanState>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from disk, folding any legacy `inbox` entries into `plans`.
    /// A missing file is not an error: a fresh repo starts from empty state.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|source| StateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut raw: RawState = serde_json::from_slice(&bytes).map_err(|source| StateError::Json {
            path: path.display().to_string(),
            source,
        })?;

        for (id, plan) in raw.inbox.drain(..) {
            raw.plans.entry(id).or_insert(plan);
        }

        Ok(Self {
            control_cursor: raw.control_cursor,
            plans: raw.plans,
        })
    }

    /// Persist via temp-file + atomic rename (§4.1, §9). Never writes the
    /// legacy `inbox` key back out.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let raw = RawState {
            control_cursor: self.control_cursor,
            plans: self.plans.clone(),
            inbox: IndexMap::new(),
        };
        let bytes = serde_json::to_vec_pretty(&raw).map_err(|source| StateError::Json {
            path: path.display().to_string(),
            source,
        })?;
        write_atomic(path, &bytes).map_err(|source| StateError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn get(&self, id: &PlanId) -> Option<&PlanState> {
        self.plans.get(id)
    }

    pub fn get_mut(&mut self, id: &PlanId) -> Option<&mut PlanState> {
        self.plans.get_mut(id)
    }

    /// Plan ids in the order they were first inserted (§4.8 "plans are
    /// processed in insertion order").
    pub fn plan_ids(&self) -> impl Iterator<Item = &PlanId> {
        self.plans.keys()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
