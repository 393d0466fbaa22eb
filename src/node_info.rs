// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Capability records advertised by network participants.
//!
//! A [`NodeInfo`] is what a compute node says about itself: which execution
//! engines it can run, how much capacity it currently has free, and a set of
//! free-form labels. Requesters keep these records in a
//! [`NodeInfoStore`](crate::nodestore::NodeInfoStore) and use them as a routing
//! hint when announcing jobs.

use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Role of a participant on the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Requester,
    Compute,
}

/// Category of job-execution runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    Docker,
    Wasm,
    Noop,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Docker => "docker",
            EngineType::Wasm => "wasm",
            EngineType::Noop => "noop",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown engine type: {0}")]
pub struct UnknownEngineType(pub String);

impl FromStr for EngineType {
    type Err = UnknownEngineType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(EngineType::Docker),
            "wasm" => Ok(EngineType::Wasm),
            "noop" => Ok(EngineType::Noop),
            _ => Err(UnknownEngineType(s.to_string())),
        }
    }
}

/// CPU (cores), memory (bytes) and disk (bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu: f64,
    pub memory: u64,
    pub disk: u64,
}

impl ResourceUsage {
    pub fn new(cpu: f64, memory: u64, disk: u64) -> Self {
        Self { cpu, memory, disk }
    }

    pub fn is_zero(&self) -> bool {
        self.cpu == 0.0 && self.memory == 0 && self.disk == 0
    }

    /// True when every dimension of `self` fits inside `limit`.
    pub fn fits_within(&self, limit: &ResourceUsage) -> bool {
        self.cpu <= limit.cpu && self.memory <= limit.memory && self.disk <= limit.disk
    }

    /// Names of the dimensions where `self` exceeds `limit`.
    pub fn exceeded_dimensions(&self, limit: &ResourceUsage) -> Vec<&'static str> {
        let mut exceeded = Vec::new();
        if self.cpu > limit.cpu {
            exceeded.push("cpu");
        }
        if self.memory > limit.memory {
            exceeded.push("memory");
        }
        if self.disk > limit.disk {
            exceeded.push("disk");
        }
        exceeded
    }

    pub fn saturating_sub(&self, other: &ResourceUsage) -> ResourceUsage {
        ResourceUsage {
            cpu: (self.cpu - other.cpu).max(0.0),
            memory: self.memory.saturating_sub(other.memory),
            disk: self.disk.saturating_sub(other.disk),
        }
    }

    /// Component-wise sum, clamped to `cap`.
    pub fn add_capped(&self, other: &ResourceUsage, cap: &ResourceUsage) -> ResourceUsage {
        ResourceUsage {
            cpu: (self.cpu + other.cpu).min(cap.cpu),
            memory: self.memory.saturating_add(other.memory).min(cap.memory),
            disk: self.disk.saturating_add(other.disk).min(cap.disk),
        }
    }
}

impl fmt::Display for ResourceUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu={} memory={}B disk={}B",
            self.cpu, self.memory, self.disk
        )
    }
}

/// Compute-specific part of a capability record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeNodeInfo {
    pub execution_engines: BTreeSet<EngineType>,
    pub max_capacity: ResourceUsage,
    pub available_capacity: ResourceUsage,
    /// Largest single job the node accepts. Zero means "same as max capacity".
    pub max_job_requirements: ResourceUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub peer_id: PeerId,
    pub node_type: NodeType,
    pub compute_node_info: ComputeNodeInfo,
    pub labels: BTreeSet<String>,
}

impl NodeInfo {
    pub fn compute(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            node_type: NodeType::Compute,
            compute_node_info: ComputeNodeInfo::default(),
            labels: BTreeSet::new(),
        }
    }

    pub fn requester(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            node_type: NodeType::Requester,
            compute_node_info: ComputeNodeInfo::default(),
            labels: BTreeSet::new(),
        }
    }

    pub fn with_engines<I: IntoIterator<Item = EngineType>>(mut self, engines: I) -> Self {
        self.compute_node_info.execution_engines = engines.into_iter().collect();
        self
    }

    /// Sets both max and available capacity.
    pub fn with_capacity(mut self, capacity: ResourceUsage) -> Self {
        self.compute_node_info.max_capacity = capacity;
        self.compute_node_info.available_capacity = capacity;
        self
    }

    pub fn with_available_capacity(mut self, capacity: ResourceUsage) -> Self {
        self.compute_node_info.available_capacity = capacity;
        self
    }

    pub fn with_max_job_requirements(mut self, limit: ResourceUsage) -> Self {
        self.compute_node_info.max_job_requirements = limit;
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_compute_node(&self) -> bool {
        self.node_type == NodeType::Compute
    }

    pub fn execution_engines(&self) -> &BTreeSet<EngineType> {
        &self.compute_node_info.execution_engines
    }

    pub fn supports_engine(&self, engine: EngineType) -> bool {
        self.compute_node_info.execution_engines.contains(&engine)
    }

    /// Effective per-job limit: the explicit job limit when set, else max capacity.
    pub fn job_limit(&self) -> ResourceUsage {
        let info = &self.compute_node_info;
        if info.max_job_requirements.is_zero() {
            info.max_capacity
        } else {
            info.max_job_requirements
        }
    }

    pub fn label_value(&self, key: &str) -> Option<&str> {
        label_value(&self.labels, key)
    }
}

/// Value of a `key=value` label. Bare labels (`gpu`) yield an empty value.
pub fn label_value<'a>(labels: &'a BTreeSet<String>, key: &str) -> Option<&'a str> {
    labels.iter().find_map(|label| match label.split_once('=') {
        Some((k, v)) if k == key => Some(v),
        None if label == key => Some(""),
        _ => None,
    })
}
