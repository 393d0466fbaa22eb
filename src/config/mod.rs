// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Node configuration: built-in defaults, optional TOML file, then
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::requester::SelectionPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Freshness window of a registry entry after its last advertisement.
    pub node_info_ttl_secs: u64,
    /// How often compute nodes re-advertise. Must be below the TTL.
    pub publish_interval_secs: u64,
    /// How long the requester collects bids for one job.
    pub bid_window_ms: u64,
    /// Deadline for one node's whole bid chain. Zero disables it.
    pub bid_evaluation_timeout_ms: u64,
    pub announce_rejections: bool,
    /// Ignore the registry and announce every job to every node.
    pub always_broadcast: bool,
    pub selection_policy: SelectionPolicy,
    pub registry_timeout_secs: u64,
    /// How long the requester waits for an awarded node's execution report.
    /// Zero waits indefinitely.
    pub award_timeout_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_info_ttl_secs: 30,
            publish_interval_secs: 10,
            bid_window_ms: 2000,
            bid_evaluation_timeout_ms: 1000,
            announce_rejections: false,
            always_broadcast: false,
            selection_policy: SelectionPolicy::FirstN,
            registry_timeout_secs: 10,
            award_timeout_secs: 600,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies `NODE_INFO_TTL_SECS`, `BID_WINDOW_MS` and friends from
    /// `lookup`. Values that do not parse are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse_into<T: std::str::FromStr>(key: &str, value: Option<String>, target: &mut T) {
            if let Some(raw) = value {
                match raw.trim().parse() {
                    Ok(parsed) => *target = parsed,
                    Err(_) => warn!("Ignoring {}={:?}: not a valid value", key, raw),
                }
            }
        }

        parse_into("NODE_INFO_TTL_SECS", lookup("NODE_INFO_TTL_SECS"), &mut self.node_info_ttl_secs);
        parse_into(
            "PUBLISH_INTERVAL_SECS",
            lookup("PUBLISH_INTERVAL_SECS"),
            &mut self.publish_interval_secs,
        );
        parse_into("BID_WINDOW_MS", lookup("BID_WINDOW_MS"), &mut self.bid_window_ms);
        parse_into(
            "BID_EVALUATION_TIMEOUT_MS",
            lookup("BID_EVALUATION_TIMEOUT_MS"),
            &mut self.bid_evaluation_timeout_ms,
        );
        parse_into(
            "ANNOUNCE_REJECTIONS",
            lookup("ANNOUNCE_REJECTIONS"),
            &mut self.announce_rejections,
        );
        parse_into("ALWAYS_BROADCAST", lookup("ALWAYS_BROADCAST"), &mut self.always_broadcast);
        parse_into(
            "REGISTRY_TIMEOUT_SECS",
            lookup("REGISTRY_TIMEOUT_SECS"),
            &mut self.registry_timeout_secs,
        );
        parse_into("AWARD_TIMEOUT_SECS", lookup("AWARD_TIMEOUT_SECS"), &mut self.award_timeout_secs);

        if let Some(policy) = lookup("SELECTION_POLICY") {
            match policy.trim() {
                "first_n" => self.selection_policy = SelectionPolicy::FirstN,
                "most_available_capacity" => {
                    self.selection_policy = SelectionPolicy::MostAvailableCapacity
                }
                other => warn!("Ignoring SELECTION_POLICY={:?}: unknown policy", other),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_info_ttl_secs == 0 {
            return Err(ConfigError::Invalid("node_info_ttl_secs must be positive".into()));
        }
        if self.bid_window_ms == 0 {
            return Err(ConfigError::Invalid("bid_window_ms must be positive".into()));
        }
        if self.publish_interval_secs == 0 || self.publish_interval_secs >= self.node_info_ttl_secs {
            return Err(ConfigError::Invalid(format!(
                "publish_interval_secs ({}) must be positive and below node_info_ttl_secs ({})",
                self.publish_interval_secs, self.node_info_ttl_secs
            )));
        }
        Ok(())
    }

    pub fn node_info_ttl(&self) -> Duration {
        Duration::from_secs(self.node_info_ttl_secs)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs)
    }

    pub fn bid_window(&self) -> Duration {
        Duration::from_millis(self.bid_window_ms)
    }

    pub fn bid_evaluation_timeout(&self) -> Option<Duration> {
        (self.bid_evaluation_timeout_ms > 0)
            .then(|| Duration::from_millis(self.bid_evaluation_timeout_ms))
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn award_timeout(&self) -> Option<Duration> {
        (self.award_timeout_secs > 0).then(|| Duration::from_secs(self.award_timeout_secs))
    }
}
