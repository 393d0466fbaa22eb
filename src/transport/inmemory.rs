// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use libp2p::PeerId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace, warn};

use super::{AnnouncementScope, BidResponse, ExecutionReport, JobAnnouncement, Transport, TransportError};
use crate::compute::ComputeNode;
use crate::job::Job;

/// In-process [`Transport`] that routes messages straight to registered
/// compute nodes. Every node answers an announcement on its own task.
#[derive(Clone, Default)]
pub struct InMemoryNetwork {
    nodes: Arc<RwLock<HashMap<PeerId, Arc<ComputeNode>>>>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, node: Arc<ComputeNode>) {
        let peer_id = node.peer_id();
        debug!("Registering compute node {} on in-memory network", peer_id);
        self.nodes.write().await.insert(peer_id, node);
    }

    pub async fn unregister(&self, peer_id: &PeerId) -> bool {
        self.nodes.write().await.remove(peer_id).is_some()
    }

    pub async fn peers(&self) -> Vec<PeerId> {
        self.nodes.read().await.keys().copied().collect()
    }

    async fn resolve(&self, scope: &AnnouncementScope) -> Vec<Arc<ComputeNode>> {
        let nodes = self.nodes.read().await;
        match scope {
            AnnouncementScope::Broadcast => nodes.values().cloned().collect(),
            AnnouncementScope::Peers(peers) => peers
                .iter()
                .filter_map(|peer| {
                    let node = nodes.get(peer).cloned();
                    if node.is_none() {
                        warn!("Peer {} is not on the network, skipping announcement", peer);
                    }
                    node
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Transport for InMemoryNetwork {
    async fn announce(
        &self,
        announcement: JobAnnouncement,
        scope: AnnouncementScope,
    ) -> Result<mpsc::Receiver<BidResponse>, TransportError> {
        let targets = self.resolve(&scope).await;
        let (tx, rx) = mpsc::channel(targets.len().max(1));
        debug!(
            "Announcing job {} to {} compute node(s)",
            announcement.job.id,
            targets.len()
        );

        let announcement = Arc::new(announcement);
        for node in targets {
            let tx = tx.clone();
            let announcement = Arc::clone(&announcement);
            tokio::spawn(async move {
                if let Some(bid) = node.handle_announcement(&announcement).await {
                    if tx.send(bid).await.is_err() {
                        trace!(
                            "Bid from {} for job {} arrived after the window closed",
                            node.peer_id(),
                            announcement.job.id
                        );
                    }
                }
            });
        }
        Ok(rx)
    }

    async fn award(&self, peer: PeerId, job: Job) -> Result<ExecutionReport, TransportError> {
        let node = self
            .nodes
            .read()
            .await
            .get(&peer)
            .cloned()
            .ok_or(TransportError::UnknownPeer(peer))?;
        // Runs on its own task so the node finishes and releases capacity
        // even when the requester stops waiting.
        tokio::spawn(async move { node.execute(job).await })
            .await
            .map_err(|e| TransportError::Delivery {
                peer,
                reason: e.to_string(),
            })
    }
}
