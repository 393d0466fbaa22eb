// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use libp2p::PeerId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, trace};

use super::{NodeInfoStore, NodeStoreError};
use crate::node_info::{EngineType, NodeInfo};

#[derive(Debug, Clone)]
struct NodeInfoEntry {
    node_info: NodeInfo,
    evict_at: Instant,
}

impl NodeInfoEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.evict_at
    }
}

/// Records plus the engine index derived from them. Always mutated together.
#[derive(Debug, Default)]
struct StoreState {
    node_infos: HashMap<PeerId, NodeInfoEntry>,
    engine_index: HashMap<EngineType, HashSet<PeerId>>,
}

impl StoreState {
    fn remove_from_index(&mut self, peer_id: &PeerId, engine: EngineType) {
        if let Some(peers) = self.engine_index.get_mut(&engine) {
            peers.remove(peer_id);
            if peers.is_empty() {
                self.engine_index.remove(&engine);
            }
        }
    }

    fn remove(&mut self, peer_id: &PeerId) -> Option<NodeInfoEntry> {
        let entry = self.node_infos.remove(peer_id)?;
        for engine in entry.node_info.execution_engines() {
            self.remove_from_index(peer_id, *engine);
        }
        Some(entry)
    }
}

/// In-memory [`NodeInfoStore`] with lazy TTL expiry.
///
/// There is no sweeper. Every read compares the entry's deadline against the
/// clock, and a read that sees a stale entry spawns a task to evict it. The
/// eviction task only deletes an entry whose deadline is still the one it saw,
/// so a peer that re-advertised in the meantime keeps its record.
#[derive(Debug, Clone)]
pub struct InMemoryNodeInfoStore {
    ttl: Duration,
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryNodeInfoStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Arc::new(RwLock::new(StoreState::default())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fire-and-forget eviction of entries observed as expired.
    fn schedule_eviction(&self, stale: Vec<(PeerId, Instant)>) {
        if stale.is_empty() {
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                trace!("No runtime available, leaving {} expired node infos in place", stale.len());
                return;
            }
        };

        let state = self.state.clone();
        handle.spawn(async move {
            let mut state = state.write().await;
            for (peer_id, evict_at) in stale {
                match state.node_infos.get(&peer_id) {
                    Some(entry) if entry.evict_at == evict_at => {
                        state.remove(&peer_id);
                        debug!("Evicted expired node info for peer {}", peer_id);
                    }
                    Some(_) => {
                        trace!("Node info for peer {} was refreshed, skipping eviction", peer_id);
                    }
                    None => {
                        trace!("Node info for peer {} already removed", peer_id);
                    }
                }
            }
        });
    }

    fn collect_live<'a, I>(&self, entries: I) -> Vec<NodeInfo>
    where
        I: Iterator<Item = &'a NodeInfoEntry>,
    {
        let now = Instant::now();
        let mut live = Vec::new();
        let mut stale = Vec::new();
        for entry in entries {
            if entry.is_live(now) {
                live.push(entry.node_info.clone());
            } else {
                stale.push((entry.node_info.peer_id, entry.evict_at));
            }
        }
        self.schedule_eviction(stale);
        live
    }
}

#[async_trait]
impl NodeInfoStore for InMemoryNodeInfoStore {
    async fn add(&self, node_info: NodeInfo) -> Result<(), NodeStoreError> {
        if !node_info.is_compute_node() {
            trace!("Ignoring node info of non-compute peer {}", node_info.peer_id);
            return Ok(());
        }

        let mut state = self.state.write().await;
        let peer_id = node_info.peer_id;

        // Reconcile the index against the previous record so engines the peer
        // stopped advertising lose their membership.
        let previous_engines = state
            .node_infos
            .get(&peer_id)
            .map(|entry| entry.node_info.execution_engines().clone())
            .unwrap_or_default();
        let engines = node_info.execution_engines();

        for engine in previous_engines.difference(engines) {
            state.remove_from_index(&peer_id, *engine);
        }
        for engine in engines.difference(&previous_engines) {
            state.engine_index.entry(*engine).or_default().insert(peer_id);
        }

        trace!("Added node info {:?}", node_info);
        state.node_infos.insert(
            peer_id,
            NodeInfoEntry {
                node_info,
                evict_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, peer_id: &PeerId) -> Result<NodeInfo, NodeStoreError> {
        let state = self.state.read().await;
        let entry = state
            .node_infos
            .get(peer_id)
            .ok_or(NodeStoreError::NotFound(*peer_id))?;

        if !entry.is_live(Instant::now()) {
            self.schedule_eviction(vec![(*peer_id, entry.evict_at)]);
            return Err(NodeStoreError::NotFound(*peer_id));
        }
        Ok(entry.node_info.clone())
    }

    async fn list(&self) -> Result<Vec<NodeInfo>, NodeStoreError> {
        let state = self.state.read().await;
        Ok(self.collect_live(state.node_infos.values()))
    }

    async fn list_for_engine(&self, engine: EngineType) -> Result<Vec<NodeInfo>, NodeStoreError> {
        let state = self.state.read().await;
        let Some(peers) = state.engine_index.get(&engine) else {
            return Ok(Vec::new());
        };
        let entries = peers.iter().filter_map(|peer_id| state.node_infos.get(peer_id));
        Ok(self.collect_live(entries))
    }

    async fn delete(&self, peer_id: &PeerId) -> Result<(), NodeStoreError> {
        let mut state = self.state.write().await;
        if state.remove(peer_id).is_some() {
            debug!("Deleted node info for peer {}", peer_id);
        }
        Ok(())
    }
}
