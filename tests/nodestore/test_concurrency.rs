// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use fabstir_compute_node::node_info::{EngineType, NodeInfo};
use fabstir_compute_node::nodestore::{InMemoryNodeInfoStore, NodeInfoStore};
use libp2p::PeerId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;

const ENGINES: [EngineType; 3] = [EngineType::Docker, EngineType::Wasm, EngineType::Noop];

fn random_engines() -> Vec<EngineType> {
    let mut rng = rand::thread_rng();
    let count = rng.gen_range(0..=ENGINES.len());
    ENGINES.choose_multiple(&mut rng, count).copied().collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access_keeps_index_consistent() {
    let store = InMemoryNodeInfoStore::new(Duration::from_secs(60));
    let shared: Vec<PeerId> = (0..8).map(|_| PeerId::random()).collect();

    let mut handles = Vec::new();
    for worker in 0..16 {
        let store = store.clone();
        let shared = shared.clone();
        handles.push(tokio::spawn(async move {
            let own: Vec<PeerId> = (0..4).map(|_| PeerId::random()).collect();
            for round in 0..50 {
                let peer_id = if round % 2 == 0 {
                    shared[(worker + round) % shared.len()]
                } else {
                    own[round % own.len()]
                };
                store
                    .add(NodeInfo::compute(peer_id).with_engines(random_engines()))
                    .await
                    .unwrap();
                let _ = store.get(&peer_id).await;
                let _ = store.list_for_engine(ENGINES[round % ENGINES.len()]).await.unwrap();
                if round % 7 == 0 {
                    store.delete(&own[0]).await.unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let all = store.list().await.unwrap();
    for engine in ENGINES {
        let expected: HashSet<PeerId> = all
            .iter()
            .filter(|n| n.supports_engine(engine))
            .map(|n| n.peer_id)
            .collect();
        let indexed: HashSet<PeerId> = store
            .list_for_engine(engine)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.peer_id)
            .collect();
        assert_eq!(indexed, expected, "index mismatch for {}", engine);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_refresh_of_one_peer() {
    let store = InMemoryNodeInfoStore::new(Duration::from_secs(60));
    let peer_id = PeerId::random();

    let writers: Vec<_> = (0..32)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let engine = ENGINES[i % ENGINES.len()];
                store
                    .add(NodeInfo::compute(peer_id).with_engines([engine]))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let node = store.get(&peer_id).await.unwrap();
    let engine = *node.execution_engines().iter().next().unwrap();
    for other in ENGINES {
        let listed = store.list_for_engine(other).await.unwrap();
        assert_eq!(listed.len(), usize::from(other == engine));
    }
}
