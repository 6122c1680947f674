// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace structured error sink (§2 component I): `errors.jsonl`.
//! Every plan-scoped error (§7) lands here in addition to `PlanState.lastError`,
//! so an operator can see a plan's full failure history, not just its latest.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wharf_core::Clock;

#[derive(Debug, Error)]
pub enum ErrorLogError {
    #[error("io error writing error log {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub ts: String,
    #[serde(rename = "planId")]
    pub plan_id: String,
    pub phase: String,
    pub message: String,
}

/// Append one entry to `path`, creating the parent directory and file as
/// needed. Open-append-close, matching the bus record writer's shape.
pub fn append_error(
    path: &Path,
    clock: &impl Clock,
    plan_id: &str,
    phase: &str,
    message: impl Into<String>,
) -> Result<(), ErrorLogError> {
    let entry = ErrorLogEntry {
        ts: wharf_core::epoch_ms_to_rfc3339(clock.epoch_ms()),
        plan_id: plan_id.to_string(),
        phase: phase.to_string(),
        message: message.into(),
    };
    to_io(path, || {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{line}")
    })
}

fn to_io<F: FnOnce() -> std::io::Result<()>>(path: &Path, f: F) -> Result<(), ErrorLogError> {
    f().map_err(|source| ErrorLogError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "errors_log_tests.rs"]
mod tests;
