// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier for a running (or resumable) assistant subprocess.
//!
//! Distinct from the multiplexer session name (`tmuxSession`, a shell-level
//! construct the session adapter manages) and from the plan id: the session
//! id is whatever the assistant CLI itself hands back (or, for `claude`,
//! what we pre-generate) so a later `resume` can continue the conversation.

crate::define_id! {
    pub struct SessionId;
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
