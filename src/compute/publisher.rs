// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ComputeNode;
use crate::nodestore::{NodeInfoStore, NodeStoreError};

/// Re-advertises a compute node's capability record on a fixed interval so
/// its registry entry never reaches its TTL while the node is up.
#[derive(Clone)]
pub struct NodeInfoPublisher {
    node: Arc<ComputeNode>,
    store: Arc<dyn NodeInfoStore>,
    interval: Duration,
}

impl NodeInfoPublisher {
    pub fn new(node: Arc<ComputeNode>, store: Arc<dyn NodeInfoStore>, interval: Duration) -> Self {
        Self {
            node,
            store,
            interval,
        }
    }

    pub async fn publish_once(&self) -> Result<(), NodeStoreError> {
        let node_info = self.node.node_info().await;
        debug!("Publishing node info for {}", node_info.peer_id);
        self.store.add(node_info).await
    }

    /// Publishes immediately, then every interval until `shutdown` fires.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.publish_once().await {
                            warn!("Failed to publish node info for {}: {}", self.node.peer_id(), e);
                        }
                    }
                    _ = shutdown.cancelled() => {
                        info!("Node info publisher for {} stopped", self.node.peer_id());
                        break;
                    }
                }
            }
        })
    }
}
