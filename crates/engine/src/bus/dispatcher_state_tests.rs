// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn load_missing_file_returns_default() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dispatcher.json");
    let state = DispatcherState::load(&path).unwrap();
    assert_eq!(state.events_offset, 0);
    assert_eq!(state.actions_offset, 0);
    assert!(!state.is_processed("anything"));
}

#[test]
fn save_then_load_round_trips() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("dispatcher.json");

    let mut state = DispatcherState::default();
    state.events_offset = 128;
    state.actions_offset = 64;
    state.mark_processed("ev-1");
    state.mark_processed("ev-2");
    state.save(&path).unwrap();

    let reloaded = DispatcherState::load(&path).unwrap();
    assert_eq!(reloaded.events_offset, 128);
    assert_eq!(reloaded.actions_offset, 64);
    assert!(reloaded.is_processed("ev-1"));
    assert!(reloaded.is_processed("ev-2"));
    assert!(!reloaded.is_processed("ev-3"));
}

#[test]
fn mark_processed_is_idempotent() {
    let mut state = DispatcherState::default();
    state.mark_processed("ev-1");
    state.mark_processed("ev-1");
    assert_eq!(state.processed_event_ids.len(), 1);
}

#[test]
fn ring_is_pruned_to_configured_size() {
    let mut state = DispatcherState::default();
    for i in 0..(PROCESSED_EVENT_ID_RING_SIZE + 10) {
        state.mark_processed(format!("ev-{i}"));
    }
    assert_eq!(state.processed_event_ids.len(), PROCESSED_EVENT_ID_RING_SIZE);
    // The oldest ids should have been evicted first.
    assert!(!state.is_processed("ev-0"));
    assert!(!state.is_processed("ev-9"));
    assert!(state.is_processed("ev-10"));
    assert!(state.is_processed(&format!("ev-{}", PROCESSED_EVENT_ID_RING_SIZE + 9)));
}
