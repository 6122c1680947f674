// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves a user-supplied identifier (exact plan id, branch name, or a
//! filename prefix) to the one canonical plan id it must refer to.

use indexmap::IndexMap;
use thiserror::Error;
use wharf_core::{PlanId, PlanState};
use wharf_storage::inbox;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no plan matches {query:?}")]
    NotFound { query: String },
    #[error("{query:?} matches more than one plan: {candidates:?}")]
    Ambiguous { query: String, candidates: Vec<String> },
    #[error("io error reading inbox: {0}")]
    Inbox(#[from] inbox::InboxError),
}

/// Resolve `query` against the inbox directory and the in-memory `plans`
/// map, trying each strategy in order and stopping at the first that
/// yields any match:
///
/// 1. exact file match in the inbox (`<query>.md`)
/// 2. exact match against a key in `plans`
/// 3. a plan whose `branch` field equals `query`
/// 4. a plan id that `query` is a prefix of
///
/// A strategy that yields more than one candidate is ambiguous and errors
/// immediately rather than falling through to a later strategy.
pub fn resolve_plan_id(
    query: &str,
    inbox_dir: &std::path::Path,
    plans: &IndexMap<PlanId, PlanState>,
) -> Result<PlanId, ResolveError> {
    let inbox_ids = inbox::list_inbox_plan_ids(inbox_dir)?;
    if let Some(id) = inbox_ids.iter().find(|id| id.as_str() == query) {
        return Ok(id.clone());
    }

    if let Some((id, _)) = plans.iter().find(|(id, _)| id.as_str() == query) {
        return Ok(id.clone());
    }

    let branch_matches: Vec<&PlanId> = plans
        .iter()
        .filter(|(_, state)| state.branch.as_deref() == Some(query))
        .map(|(id, _)| id)
        .collect();
    match branch_matches.len() {
        0 => {}
        1 => return Ok(branch_matches[0].clone()),
        _ => {
            return Err(ResolveError::Ambiguous {
                query: query.to_string(),
                candidates: branch_matches.iter().map(|id| id.as_str().to_string()).collect(),
            })
        }
    }

    let prefix_matches: Vec<&PlanId> = plans
        .keys()
        .filter(|id| id.as_str().starts_with(query))
        .collect();
    match prefix_matches.len() {
        0 => Err(ResolveError::NotFound {
            query: query.to_string(),
        }),
        1 => Ok(prefix_matches[0].clone()),
        _ => Err(ResolveError::Ambiguous {
            query: query.to_string(),
            candidates: prefix_matches.iter().map(|id| id.as_str().to_string()).collect(),
        }),
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
