// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Requester-side registry of compute node capability records.

pub mod inmemory;

use async_trait::async_trait;
use libp2p::PeerId;
use thiserror::Error;

use crate::node_info::{EngineType, NodeInfo};

pub use inmemory::InMemoryNodeInfoStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeStoreError {
    /// Never registered, deleted, or expired. Callers cannot tell these apart.
    #[error("Node not found: {0}")]
    NotFound(PeerId),
}

/// Store of live capability records, indexed by execution engine.
///
/// Reads never return an expired record. Empty results are `Ok(vec![])`.
#[async_trait]
pub trait NodeInfoStore: Send + Sync {
    /// Insert or refresh a record. Records of non-compute nodes are ignored.
    async fn add(&self, node_info: NodeInfo) -> Result<(), NodeStoreError>;

    async fn get(&self, peer_id: &PeerId) -> Result<NodeInfo, NodeStoreError>;

    async fn list(&self) -> Result<Vec<NodeInfo>, NodeStoreError>;

    async fn list_for_engine(&self, engine: EngineType) -> Result<Vec<NodeInfo>, NodeStoreError>;

    /// Remove a record. Unknown peers are not an error.
    async fn delete(&self, peer_id: &PeerId) -> Result<(), NodeStoreError>;
}
