// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `config.json` schema (§6): agent model selection, workspace layout,
//! bus tick cadence, bridges, the review provider, and plugins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {reason}")]
    Invalid { reason: String },
    #[error("bridge `{name}` has unrecognized kind `{kind}`")]
    InvalidBridge { name: String, kind: String },
    #[error("review.provider `{provider}` is not a recognized review provider")]
    UnknownReviewProvider { provider: String },
}

fn default_base_branch() -> String {
    "main".to_string()
}

fn default_github_poll_interval_ms() -> u64 {
    60_000
}

fn default_bus_tick_interval_ms() -> u64 {
    1_000
}

fn default_review_provider() -> ReviewProviderKind {
    ReviewProviderKind::Platform
}

/// Per-agent model overrides. `default` applies when a stage has no
/// specific override; any other key names a pipeline stage (e.g. `design`,
/// `todo`, `review`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(flatten)]
    pub stages: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(flatten)]
    pub by_agent: HashMap<String, AgentModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusConfig {
    #[serde(default = "default_bus_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_bus_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(flatten)]
    pub settings: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewProviderKind {
    Local,
    Platform,
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewConfig {
    #[serde(default = "default_review_provider")]
    pub provider: ReviewProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            provider: default_review_provider(),
            local: None,
            github: None,
            custom: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresetConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktrees_dir: Option<PathBuf>,
    #[serde(default = "default_base_branch")]
    pub base_branch: String,
    #[serde(default = "default_github_poll_interval_ms")]
    pub github_poll_interval_ms: u64,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub bridges: HashMap<String, BridgeConfig>,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub plugins: HashMap<String, PluginConfig>,
    #[serde(default)]
    pub plugin_order: Vec<String>,
    #[serde(default)]
    pub presets: HashMap<String, PresetConfig>,
}

impl Config {
    /// Load config from `path`, falling back to defaults if the file does
    /// not exist (a fresh repo has no `config.json` until one is written).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let bytes = std::fs::read(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Basic sanity checks beyond what serde's schema already enforces:
    /// every name in `pluginOrder` must refer to a configured plugin, every
    /// bridge's `kind` must be one this build recognizes, and a `custom`
    /// review provider must name the module implementing it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.plugin_order {
            if !self.plugins.contains_key(name) {
                return Err(ConfigError::Invalid {
                    reason: format!("pluginOrder references unknown plugin `{name}`"),
                });
            }
        }

        for (name, bridge) in &self.bridges {
            if !KNOWN_BRIDGE_KINDS.contains(&bridge.kind.as_str()) {
                return Err(ConfigError::InvalidBridge {
                    name: name.clone(),
                    kind: bridge.kind.clone(),
                });
            }
        }

        if self.review.provider == ReviewProviderKind::Custom {
            let names_module = self
                .review
                .custom
                .as_ref()
                .and_then(|v| v.get("module"))
                .and_then(|v| v.as_str())
                .is_some();
            if !names_module {
                return Err(ConfigError::UnknownReviewProvider {
                    provider: "custom".to_string(),
                });
            }
        }

        Ok(())
    }
}

const KNOWN_BRIDGE_KINDS: &[&str] = &["command", "github", "gitlab", "local", "webhook", "custom"];

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
