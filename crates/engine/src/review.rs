// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review providers: an alternative ingress for feedback, mutually
//! exclusive with a platform bridge. The local provider parses
//! `review.md`'s `## ready` section; the platform provider delegates to
//! whichever bridge owns the plan's change request.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use wharf_core::{Event, InlineSide, Severity};

use crate::bus::{BridgeContext, InboundBridge};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("bridge poll failed: {0}")]
    Bridge(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewItem {
    pub hash: String,
    pub text: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub side: Option<InlineSide>,
}

impl ReviewItem {
    fn hash_of(text: &str, file: Option<&str>, line: Option<u32>, side: Option<InlineSide>) -> String {
        let side_str = match side {
            Some(InlineSide::Left) => "left",
            Some(InlineSide::Right) => "right",
            None => "",
        };
        let canonical = format!(
            "{}|{}|{}|{}",
            text,
            file.unwrap_or(""),
            line.map(|l| l.to_string()).unwrap_or_default(),
            side_str
        );
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{:x}", digest)[..16].to_string()
    }
}

#[async_trait]
pub trait ReviewProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn poll(
        &self,
        ctx: &BridgeContext,
        state: serde_json::Value,
    ) -> Result<(Vec<ReviewItem>, serde_json::Value), ReviewError>;

    /// Post a reply, if the provider supports it. Not every provider does
    /// (the local filesystem provider has no outward channel).
    async fn respond(
        &self,
        _ctx: &BridgeContext,
        _message: &str,
        _related_item_id: Option<&str>,
    ) -> Result<(), ReviewError> {
        Ok(())
    }

    /// Whether the state returned by the most recent `poll` indicates the
    /// reviewed change has been merged/closed out. Providers that have no
    /// notion of merging (or haven't seen it happen) default to `false`.
    fn is_merged(&self, _state: &serde_json::Value) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct LocalReviewState {
    emitted_hashes: HashSet<String>,
    #[serde(default)]
    merged: bool,
}

/// Reads `<worktree>/<local>/review.md`, diffing the `## ready` section's
/// items against previously-emitted hashes.
pub struct LocalReviewProvider {
    local_dir_name: String,
}

impl LocalReviewProvider {
    pub fn new(local_dir_name: impl Into<String>) -> Self {
        Self {
            local_dir_name: local_dir_name.into(),
        }
    }

    fn review_md_path(&self, worktree: &Path) -> PathBuf {
        worktree.join(&self.local_dir_name).join("review.md")
    }
}

#[async_trait]
impl ReviewProvider for LocalReviewProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn poll(
        &self,
        ctx: &BridgeContext,
        state: serde_json::Value,
    ) -> Result<(Vec<ReviewItem>, serde_json::Value), ReviewError> {
        let worktree = ctx
            .worktree
            .as_deref()
            .ok_or_else(|| ReviewError::Bridge("local review provider requires a worktree".into()))?;
        let path = self.review_md_path(worktree);

        let mut local_state: LocalReviewState = if state.is_null() {
            LocalReviewState::default()
        } else {
            serde_json::from_value(state).unwrap_or_default()
        };

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(source) => {
                return Err(ReviewError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        let items = parse_ready_items(&contents);
        let current_hashes: HashSet<String> = items.iter().map(|i| i.hash.clone()).collect();

        let new_items: Vec<ReviewItem> = items
            .into_iter()
            .filter(|item| !local_state.emitted_hashes.contains(&item.hash))
            .collect();

        // Items that disappeared from the file are expunged from the
        // emitted set so a reintroduction later is treated as new again.
        local_state.emitted_hashes.retain(|h| current_hashes.contains(h));
        for item in &new_items {
            local_state.emitted_hashes.insert(item.hash.clone());
        }

        // Merging is a one-way latch: once the heading has been seen once
        // it stays merged even if a later edit removes it.
        local_state.merged = local_state.merged || has_merged_heading(&contents);

        let next_state = serde_json::to_value(&local_state).unwrap_or(serde_json::Value::Null);
        Ok((new_items, next_state))
    }

    fn is_merged(&self, state: &serde_json::Value) -> bool {
        serde_json::from_value::<LocalReviewState>(state.clone())
            .map(|s| s.merged)
            .unwrap_or(false)
    }
}

/// A `## merged` heading anywhere in `review.md` marks the change as
/// merged, regardless of what's below it.
fn has_merged_heading(contents: &str) -> bool {
    contents
        .lines()
        .any(|line| line.trim().starts_with("## ") && line.trim()[3..].trim().eq_ignore_ascii_case("merged"))
}

/// Parse the `## ready` section: `- [ ] text` items, each optionally
/// followed by indented `file:`, `line:`, `side:` metadata lines.
fn parse_ready_items(contents: &str) -> Vec<ReviewItem> {
    let mut in_ready_section = false;
    let mut items = Vec::new();
    let mut pending: Option<(String, Option<String>, Option<u32>, Option<InlineSide>)> = None;

    let flush = |pending: &mut Option<(String, Option<String>, Option<u32>, Option<InlineSide>)>,
                 items: &mut Vec<ReviewItem>| {
        if let Some((text, file, line, side)) = pending.take() {
            let hash = ReviewItem::hash_of(&text, file.as_deref(), line, side);
            items.push(ReviewItem {
                hash,
                text,
                file,
                line,
                side,
            });
        }
    };

    for raw_line in contents.lines() {
        let trimmed_heading = raw_line.trim();
        if trimmed_heading.starts_with("## ") {
            flush(&mut pending, &mut items);
            in_ready_section = trimmed_heading[3..].trim().eq_ignore_ascii_case("ready");
            continue;
        }
        if !in_ready_section {
            continue;
        }

        if let Some(text) = raw_line.trim_start().strip_prefix("- [ ] ") {
            flush(&mut pending, &mut items);
            pending = Some((text.trim().to_string(), None, None, None));
            continue;
        }

        let indented = raw_line.starts_with(' ') || raw_line.starts_with('\t');
        if indented {
            if let Some((_, file, line, side)) = pending.as_mut() {
                let meta = raw_line.trim();
                if let Some(value) = meta.strip_prefix("file:") {
                    *file = Some(value.trim().to_string());
                } else if let Some(value) = meta.strip_prefix("line:") {
                    *line = value.trim().parse().ok();
                } else if let Some(value) = meta.strip_prefix("side:") {
                    *side = match value.trim() {
                        "left" => Some(InlineSide::Left),
                        "right" => Some(InlineSide::Right),
                        _ => None,
                    };
                }
            }
            continue;
        }

        flush(&mut pending, &mut items);
    }
    flush(&mut pending, &mut items);
    items
}

/// Flip `[ ]` to `[x]` on the `review.md` checkbox whose (text, file, line,
/// side) matches `criteria`, e.g. once the corresponding TODO completes.
pub async fn update_review_md_checkbox(
    worktree: &Path,
    local_dir_name: &str,
    criteria: &ReviewItem,
) -> Result<bool, ReviewError> {
    let path = worktree.join(local_dir_name).join("review.md");
    let contents = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ReviewError::Io {
            path: path.display().to_string(),
            source,
        })?;

    let target_hash = &criteria.hash;
    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
    let mut updated = false;
    let mut i = 0;
    while i < lines.len() {
        if let Some(text) = lines[i].trim_start().strip_prefix("- [ ] ") {
            let text = text.trim().to_string();
            let (mut file, mut line, mut side) = (None, None, None);
            let mut j = i + 1;
            while j < lines.len() {
                let indented = lines[j].starts_with(' ') || lines[j].starts_with('\t');
                if !indented {
                    break;
                }
                let meta = lines[j].trim();
                if let Some(value) = meta.strip_prefix("file:") {
                    file = Some(value.trim().to_string());
                } else if let Some(value) = meta.strip_prefix("line:") {
                    line = value.trim().parse().ok();
                } else if let Some(value) = meta.strip_prefix("side:") {
                    side = match value.trim() {
                        "left" => Some(InlineSide::Left),
                        "right" => Some(InlineSide::Right),
                        _ => None,
                    };
                }
                j += 1;
            }
            let hash = ReviewItem::hash_of(&text, file.as_deref(), line, side);
            if &hash == target_hash {
                let indent_len = lines[i].len() - lines[i].trim_start().len();
                lines[i] = format!("{}- [x] {}", &lines[i][..indent_len], text);
                updated = true;
                break;
            }
        }
        i += 1;
    }

    if updated {
        let mut new_contents = lines.join("\n");
        if contents.ends_with('\n') {
            new_contents.push('\n');
        }
        wharf_storage::write_atomic(&path, new_contents.as_bytes()).map_err(|source| {
            ReviewError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
    }
    Ok(updated)
}

/// Converts a bridge's inbound event poll to review items tagged with
/// source `review:<providerName>` / type `review_feedback` — or, conversely,
/// a `ReviewItem` produced by the local provider gets wrapped into an
/// `Event` the same way so both providers feed the same triage path.
pub fn review_item_to_event(provider_name: &str, item: &ReviewItem) -> Event {
    let mut event = Event::new(
        format!("review-{}", item.hash),
        format!("review:{provider_name}"),
        "review_feedback",
        Severity::Info,
        item.text.clone(),
        item.text.clone(),
    );
    if let (Some(file), Some(line)) = (&item.file, item.line) {
        let mut context = std::collections::HashMap::new();
        context.insert("file".to_string(), serde_json::json!(file));
        context.insert("line".to_string(), serde_json::json!(line));
        if let Some(side) = item.side {
            context.insert(
                "side".to_string(),
                serde_json::json!(match side {
                    InlineSide::Left => "left",
                    InlineSide::Right => "right",
                }),
            );
        }
        event.context = Some(context);
    }
    event
}

/// Delegates to the platform bridge's event polling, converting the
/// bridge's events directly into review items with a dummy hash (the
/// platform bridge's own event id is already globally unique, so no
/// content hashing is needed the way the local file parser requires it).
pub struct PlatformReviewProvider {
    bridge: Arc<dyn InboundBridge>,
}

impl PlatformReviewProvider {
    pub fn new(bridge: Arc<dyn InboundBridge>) -> Self {
        Self { bridge }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct PlatformReviewState {
    bridge: serde_json::Value,
    #[serde(default)]
    merged: bool,
}

#[async_trait]
impl ReviewProvider for PlatformReviewProvider {
    fn name(&self) -> &str {
        "platform"
    }

    async fn poll(
        &self,
        ctx: &BridgeContext,
        state: serde_json::Value,
    ) -> Result<(Vec<ReviewItem>, serde_json::Value), ReviewError> {
        let wrapped: PlatformReviewState = if state.is_null() {
            PlatformReviewState::default()
        } else {
            serde_json::from_value(state).unwrap_or_default()
        };

        let poll = self
            .bridge
            .events(ctx, wrapped.bridge)
            .await
            .map_err(|err| ReviewError::Bridge(err.to_string()))?;

        let merged = wrapped.merged || poll.events.iter().any(|event| event.event_type == "merged");

        let items = poll
            .events
            .into_iter()
            .map(|event| ReviewItem {
                hash: event.id.as_str().to_string(),
                text: event.body,
                file: None,
                line: None,
                side: None,
            })
            .collect();

        let next_state = serde_json::to_value(&PlatformReviewState {
            bridge: poll.state,
            merged,
        })
        .unwrap_or(serde_json::Value::Null);
        Ok((items, next_state))
    }

    fn is_merged(&self, state: &serde_json::Value) -> bool {
        serde_json::from_value::<PlatformReviewState>(state.clone())
            .map(|s| s.merged)
            .unwrap_or(false)
    }
}

/// The tiny registry that dispatches to the configured provider. Defaults
/// to the platform provider for backwards compatibility with configs
/// predating the local provider.
pub struct ReviewProviderRegistry {
    providers: std::collections::HashMap<String, Arc<dyn ReviewProvider>>,
    default_name: String,
}

impl ReviewProviderRegistry {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            providers: std::collections::HashMap::new(),
            default_name: default_name.into(),
        }
    }

    pub fn register(&mut self, provider: Arc<dyn ReviewProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn resolve(&self, configured_name: Option<&str>) -> Option<Arc<dyn ReviewProvider>> {
        let name = configured_name.unwrap_or(&self.default_name);
        self.providers.get(name).cloned()
    }
}

#[cfg(test)]
#[path = "review_tests.rs"]
mod tests;
