// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use fabstir_compute_node::bidstrategy::{CapacityBidStrategy, ChainedBidStrategy, EngineBidStrategy};
use fabstir_compute_node::compute::{ComputeNode, Executor, NoopExecutor};
use fabstir_compute_node::node_info::{EngineType, NodeInfo, ResourceUsage};
use fabstir_compute_node::nodestore::{InMemoryNodeInfoStore, NodeInfoStore};
use fabstir_compute_node::requester::{
    Coordinator, CoordinatorConfig, InMemoryJobStore, SelectionPolicy,
};
use fabstir_compute_node::transport::InMemoryNetwork;
use libp2p::PeerId;
use std::sync::Arc;
use std::time::Duration;

/// Registry, network and job store shared by one requester.
pub struct Stack {
    pub store: Arc<InMemoryNodeInfoStore>,
    pub network: InMemoryNetwork,
    pub jobs: Arc<InMemoryJobStore>,
}

impl Stack {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryNodeInfoStore::new(Duration::from_secs(60))),
            network: InMemoryNetwork::new(),
            jobs: Arc::new(InMemoryJobStore::new()),
        }
    }

    /// Puts the node on the network and, when `advertise` is set, into the registry.
    pub async fn add_node(&self, node: ComputeNode, advertise: bool) -> Arc<ComputeNode> {
        let node = Arc::new(node);
        if advertise {
            self.store.add(node.node_info().await).await.unwrap();
        }
        self.network.register(node.clone()).await;
        node
    }

    pub fn coordinator(&self, config: CoordinatorConfig) -> Coordinator {
        Coordinator::new(
            PeerId::random(),
            config,
            self.store.clone(),
            Arc::new(self.network.clone()),
            self.jobs.clone(),
        )
    }
}

pub fn window(millis: u64) -> CoordinatorConfig {
    CoordinatorConfig {
        bid_window: Duration::from_millis(millis),
        always_broadcast: false,
        selection_policy: SelectionPolicy::FirstN,
        award_timeout: None,
    }
}

pub fn node_info(engines: &[EngineType], cpu: f64) -> NodeInfo {
    NodeInfo::compute(PeerId::random())
        .with_engines(engines.iter().copied())
        .with_capacity(ResourceUsage::new(cpu, 8_000, 8_000))
}

pub fn basic_chain() -> ChainedBidStrategy {
    ChainedBidStrategy::new()
        .with_strategy(EngineBidStrategy)
        .with_strategy(CapacityBidStrategy)
}

pub fn noop_node(engines: &[EngineType]) -> ComputeNode {
    ComputeNode::new(node_info(engines, 4.0), basic_chain(), Arc::new(NoopExecutor::new()))
}

pub fn node_with_executor(engines: &[EngineType], executor: Arc<dyn Executor>) -> ComputeNode {
    ComputeNode::new(node_info(engines, 4.0), basic_chain(), executor)
}
