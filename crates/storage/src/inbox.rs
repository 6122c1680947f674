// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbox staging (§3, §6): `<repo>/<local>/inbox/<planId>.md` plus a sibling
//! `<planId>.json` metadata file, before a plan is activated into a
//! workspace.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wharf_core::PlanId;

use crate::atomic::write_atomic;

#[derive(Debug, Error)]
pub enum InboxError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed inbox metadata at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The sibling `<planId>.json` next to an inbox plan file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboxMeta {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

pub fn plan_md_path(inbox_dir: &Path, id: &PlanId) -> std::path::PathBuf {
    inbox_dir.join(format!("{}.md", id.as_str()))
}

pub fn plan_meta_path(inbox_dir: &Path, id: &PlanId) -> std::path::PathBuf {
    inbox_dir.join(format!("{}.json", id.as_str()))
}

/// Write both halves of an inbox entry atomically (each file independently;
/// the pair as a whole is not atomic, matching the on-disk layout's two
/// separate files).
pub fn write_inbox_entry(
    inbox_dir: &Path,
    id: &PlanId,
    markdown: &str,
    meta: &InboxMeta,
) -> Result<(), InboxError> {
    let md_path = plan_md_path(inbox_dir, id);
    write_atomic(&md_path, markdown.as_bytes()).map_err(|source| InboxError::Io {
        path: md_path.display().to_string(),
        source,
    })?;

    let meta_path = plan_meta_path(inbox_dir, id);
    let bytes = serde_json::to_vec_pretty(meta).map_err(|source| InboxError::Json {
        path: meta_path.display().to_string(),
        source,
    })?;
    write_atomic(&meta_path, &bytes).map_err(|source| InboxError::Io {
        path: meta_path.display().to_string(),
        source,
    })
}

pub fn read_inbox_markdown(inbox_dir: &Path, id: &PlanId) -> Result<String, InboxError> {
    let path = plan_md_path(inbox_dir, id);
    std::fs::read_to_string(&path).map_err(|source| InboxError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub fn read_inbox_meta(inbox_dir: &Path, id: &PlanId) -> Result<InboxMeta, InboxError> {
    let path = plan_meta_path(inbox_dir, id);
    let bytes = std::fs::read(&path).map_err(|source| InboxError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| InboxError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// List plan ids currently staged in the inbox, derived from `<id>.md`
/// filenames. Entries without a visible `.md` file (e.g. only a stray
/// `.json`) are not returned.
pub fn list_inbox_plan_ids(inbox_dir: &Path) -> Result<Vec<PlanId>, InboxError> {
    if !inbox_dir.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    let entries = std::fs::read_dir(inbox_dir).map_err(|source| InboxError::Io {
        path: inbox_dir.display().to_string(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| InboxError::Io {
            path: inbox_dir.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("md") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(PlanId::new(stem));
            }
        }
    }
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    Ok(ids)
}

/// Remove both files of an inbox entry once it has been activated. Missing
/// files are not an error (activation is meant to be idempotent on retry).
pub fn remove_inbox_entry(inbox_dir: &Path, id: &PlanId) -> Result<(), InboxError> {
    for path in [plan_md_path(inbox_dir, id), plan_meta_path(inbox_dir, id)] {
        if path.exists() {
            std::fs::remove_file(&path).map_err(|source| InboxError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "inbox_tests.rs"]
mod tests;
