// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace `bus/state/dispatcher.json`: the byte-offset cursors into
//! `events.jsonl` / `actions.jsonl` and the bounded ring of already-triaged
//! event ids that keeps a restarted dispatcher from re-triaging history.

use std::collections::VecDeque;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wharf_storage::write_atomic;

/// Event ids older than this many entries are pruned from the dedup ring.
pub const PROCESSED_EVENT_ID_RING_SIZE: usize = 1000;

#[derive(Debug, Error)]
pub enum DispatcherStateError {
    #[error("failed to read dispatcher state {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dispatcher state {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawDispatcherState {
    #[serde(default, rename = "eventsOffset")]
    events_offset: u64,
    #[serde(default, rename = "actionsOffset")]
    actions_offset: u64,
    #[serde(default, rename = "processedEventIds")]
    processed_event_ids: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct DispatcherState {
    pub events_offset: u64,
    pub actions_offset: u64,
    processed_event_ids: VecDeque<String>,
}

impl DispatcherState {
    pub fn load(path: &Path) -> Result<Self, DispatcherStateError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|source| DispatcherStateError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawDispatcherState =
            serde_json::from_slice(&bytes).map_err(|source| DispatcherStateError::Json {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self {
            events_offset: raw.events_offset,
            actions_offset: raw.actions_offset,
            processed_event_ids: raw.processed_event_ids.into_iter().collect(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), DispatcherStateError> {
        let raw = RawDispatcherState {
            events_offset: self.events_offset,
            actions_offset: self.actions_offset,
            processed_event_ids: self.processed_event_ids.iter().cloned().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&raw).map_err(|source| DispatcherStateError::Json {
            path: path.display().to_string(),
            source,
        })?;
        write_atomic(path, &bytes).map_err(|source| DispatcherStateError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Whether `event_id` is already in the dedup ring.
    pub fn is_processed(&self, event_id: &str) -> bool {
        self.processed_event_ids.iter().any(|id| id == event_id)
    }

    /// Record `event_id` as triaged, pruning the oldest entry if the ring
    /// is full.
    pub fn mark_processed(&mut self, event_id: impl Into<String>) {
        let event_id = event_id.into();
        if self.is_processed(&event_id) {
            return;
        }
        self.processed_event_ids.push_back(event_id);
        while self.processed_event_ids.len() > PROCESSED_EVENT_ID_RING_SIZE {
            self.processed_event_ids.pop_front();
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_state_tests.rs"]
mod tests;
