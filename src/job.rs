// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::node_info::{label_value, EngineType, ResourceUsage};

/// Engine parameter holding the container image reference.
pub const DOCKER_IMAGE_KEY: &str = "Image";

/// Engine to run a job on plus engine-specific parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSpec {
    pub engine: EngineType,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl EngineSpec {
    pub fn new(engine: EngineType) -> Self {
        Self {
            engine,
            params: Map::new(),
        }
    }

    pub fn docker(image: impl Into<String>) -> Self {
        let mut params = Map::new();
        params.insert(DOCKER_IMAGE_KEY.to_string(), Value::String(image.into()));
        Self {
            engine: EngineType::Docker,
            params,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Container image for docker jobs. `None` if absent or not a string.
    pub fn image(&self) -> Option<&str> {
        self.params.get(DOCKER_IMAGE_KEY).and_then(Value::as_str)
    }
}

/// Where a job's input data may live relative to the executing node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    #[default]
    Anywhere,
    Local,
}

/// Content-addressed input mounted into the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub cid: String,
    pub mount_path: String,
}

/// Constraint on a node's labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSelector {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    NotExists(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum LabelSelectorParseError {
    #[error("Empty label selector")]
    Empty,
    #[error("Invalid label selector: {0}")]
    Invalid(String),
}

impl LabelSelector {
    pub fn key(&self) -> &str {
        match self {
            LabelSelector::Equals(k, _)
            | LabelSelector::NotEquals(k, _)
            | LabelSelector::Exists(k)
            | LabelSelector::NotExists(k) => k,
        }
    }

    pub fn matches(&self, labels: &BTreeSet<String>) -> bool {
        match (self, label_value(labels, self.key())) {
            (LabelSelector::Equals(_, expected), Some(v)) => v == expected,
            (LabelSelector::Equals(..), None) => false,
            (LabelSelector::NotEquals(_, unexpected), Some(v)) => v != unexpected,
            (LabelSelector::NotEquals(..), None) => true,
            (LabelSelector::Exists(_), found) => found.is_some(),
            (LabelSelector::NotExists(_), found) => found.is_none(),
        }
    }
}

impl FromStr for LabelSelector {
    type Err = LabelSelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LabelSelectorParseError::Empty);
        }
        let valid_key = |k: &str| !k.is_empty() && !k.contains(&['=', '!', ' '][..]);

        if let Some((key, value)) = s.split_once("!=") {
            let key = key.trim();
            if !valid_key(key) {
                return Err(LabelSelectorParseError::Invalid(s.to_string()));
            }
            return Ok(LabelSelector::NotEquals(key.to_string(), value.trim().to_string()));
        }
        if let Some((key, value)) = s.split_once('=') {
            let key = key.trim();
            if !valid_key(key) {
                return Err(LabelSelectorParseError::Invalid(s.to_string()));
            }
            return Ok(LabelSelector::Equals(key.to_string(), value.trim().to_string()));
        }
        if let Some(key) = s.strip_prefix('!') {
            let key = key.trim();
            if !valid_key(key) {
                return Err(LabelSelectorParseError::Invalid(s.to_string()));
            }
            return Ok(LabelSelector::NotExists(key.to_string()));
        }
        if !valid_key(s) {
            return Err(LabelSelectorParseError::Invalid(s.to_string()));
        }
        Ok(LabelSelector::Exists(s.to_string()))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSelector::Equals(k, v) => write!(f, "{}={}", k, v),
            LabelSelector::NotEquals(k, v) => write!(f, "{}!={}", k, v),
            LabelSelector::Exists(k) => write!(f, "{}", k),
            LabelSelector::NotExists(k) => write!(f, "!{}", k),
        }
    }
}

/// A submitted job as seen by the bidding core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub engine_spec: EngineSpec,
    pub resources: ResourceUsage,
    #[serde(default)]
    pub inputs: Vec<InputSource>,
    #[serde(default)]
    pub node_selectors: Vec<LabelSelector>,
    #[serde(default)]
    pub locality: Locality,
    /// Number of redundant executions requested.
    pub concurrency: usize,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(engine_spec: EngineSpec) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            engine_spec,
            resources: ResourceUsage::default(),
            inputs: Vec::new(),
            node_selectors: Vec::new(),
            locality: Locality::Anywhere,
            concurrency: 1,
            created_at: Utc::now(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceUsage) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<InputSource>, locality: Locality) -> Self {
        self.inputs = inputs;
        self.locality = locality;
        self
    }

    pub fn with_node_selectors(mut self, selectors: Vec<LabelSelector>) -> Self {
        self.node_selectors = selectors;
        self
    }

    pub fn engine(&self) -> EngineType {
        self.engine_spec.engine
    }
}
