// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! On-disk storage for a single repository's wharf state: the repo-local
//! directory layout, atomic JSON writes, the process lock, the inbox
//! staging area, `config.json`, and `state.json`.

mod atomic;
mod config;
mod inbox;
mod lock;
mod paths;
mod state;

pub use atomic::{write_atomic, write_atomic_json};
pub use config::{
    AgentModelConfig, AgentsConfig, BridgeConfig, BusConfig, Config, ConfigError, PluginConfig,
    PresetConfig, ReviewConfig, ReviewProviderKind,
};
pub use inbox::{
    list_inbox_plan_ids, plan_md_path, plan_meta_path, read_inbox_markdown, read_inbox_meta,
    remove_inbox_entry, write_inbox_entry, InboxError, InboxMeta,
};
pub use lock::{LockError, ProcessLock};
pub use paths::{RepoLayout, DEFAULT_LOCAL_DIR_NAME};
pub use state::{State, StateError};
