// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the multiplexer session adapter and the
//! assistant agent adapter built on top of it.

pub mod agent;
pub mod session;
pub mod subprocess;
pub mod traced;

pub use agent::{
    binary_name, extract_session_id, poll_completion, resume_args, AdapterError,
    AssistantAdapter, ExecuteRequest, ExecutionHandle, COMPLETION_POLL_INTERVAL,
    DEFAULT_AGENT_TIMEOUT,
};
pub use session::{NoOpSessionAdapter, SessionAdapter, SessionError, TmuxAdapter};
pub use traced::TracedSession;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeSession, FakeSessionAdapter, SessionCall};
