// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod bidstrategy;
pub mod cli;
pub mod compute;
pub mod config;
pub mod docker;
pub mod job;
pub mod node_info;
pub mod nodestore;
pub mod requester;
pub mod transport;
pub mod version;

// Re-export main types
pub use bidstrategy::{
    BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse, ChainedBidStrategy,
};
pub use compute::{ComputeNode, Executor, NodeInfoPublisher};
pub use config::{ConfigError, NodeConfig};
pub use job::{EngineSpec, Job, LabelSelector, Locality};
pub use node_info::{EngineType, NodeInfo, NodeType, ResourceUsage};
pub use nodestore::{InMemoryNodeInfoStore, NodeInfoStore, NodeStoreError};
pub use requester::{Coordinator, CoordinatorError, JobState, JobStateType};
pub use transport::{InMemoryNetwork, Transport};
