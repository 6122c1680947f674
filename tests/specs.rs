//! Black-box specifications for the `wharf` CLI and `wharfd` daemon.
//!
//! These tests invoke the built binaries and verify stdout, stderr, exit
//! codes, and the on-disk `wharf/` directory they leave behind.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

// cli/
#[path = "specs/cli/help.rs"]
mod cli_help;

// daemon/
#[path = "specs/daemon/lifecycle.rs"]
mod daemon_lifecycle;
