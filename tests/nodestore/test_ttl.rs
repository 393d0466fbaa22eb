// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use fabstir_compute_node::node_info::{EngineType, NodeInfo};
use fabstir_compute_node::nodestore::{InMemoryNodeInfoStore, NodeInfoStore, NodeStoreError};
use libp2p::PeerId;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn docker_node() -> NodeInfo {
    NodeInfo::compute(PeerId::random()).with_engines([EngineType::Docker])
}

#[tokio::test(start_paused = true)]
async fn test_entry_expires_after_ttl() {
    let store = InMemoryNodeInfoStore::new(Duration::from_millis(100));
    let node = docker_node();
    store.add(node.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(99)).await;
    assert_eq!(store.get(&node.peer_id).await.unwrap(), node);

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(
        store.get(&node.peer_id).await,
        Err(NodeStoreError::NotFound(node.peer_id))
    );
}

#[tokio::test(start_paused = true)]
async fn test_refresh_before_expiry_is_not_lost() {
    // Re-advertised at 80ms, read at 150ms: still inside the new window.
    let store = InMemoryNodeInfoStore::new(Duration::from_millis(100));
    let node = docker_node();
    store.add(node.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(80)).await;
    store.add(node.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(70)).await;
    assert_ok!(store.get(&node.peer_id).await);
    assert_eq!(store.list_for_engine(EngineType::Docker).await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entries_never_returned_by_lists() {
    let store = InMemoryNodeInfoStore::new(Duration::from_millis(100));
    let stale = docker_node();
    store.add(stale.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(60)).await;
    let fresh = docker_node();
    store.add(fresh.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(50)).await;
    let listed = store.list().await.unwrap();
    assert_eq!(listed, vec![fresh.clone()]);
    let by_engine = store.list_for_engine(EngineType::Docker).await.unwrap();
    assert_eq!(by_engine, vec![fresh]);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_evicted_in_background() {
    let store = InMemoryNodeInfoStore::new(Duration::from_millis(100));
    let node = docker_node();
    store.add(node.clone()).await.unwrap();

    tokio::time::advance(Duration::from_millis(150)).await;
    assert!(store.list().await.unwrap().is_empty());

    // Let the eviction task run, then a refresh must start from a clean slate.
    tokio::task::yield_now().await;
    store.add(node.clone()).await.unwrap();
    assert_eq!(store.list_for_engine(EngineType::Docker).await.unwrap(), vec![node]);
}

#[tokio::test]
async fn test_not_found_is_uniform() {
    let store = InMemoryNodeInfoStore::new(Duration::from_secs(60));
    let never = PeerId::random();
    assert_eq!(store.get(&never).await, Err(NodeStoreError::NotFound(never)));

    let node = docker_node();
    store.add(node.clone()).await.unwrap();
    store.delete(&node.peer_id).await.unwrap();
    assert_eq!(
        store.get(&node.peer_id).await,
        Err(NodeStoreError::NotFound(node.peer_id))
    );
}

#[tokio::test]
async fn test_empty_results_are_not_errors() {
    let store = InMemoryNodeInfoStore::new(Duration::from_secs(60));
    assert!(store.list().await.unwrap().is_empty());
    assert!(store.list_for_engine(EngineType::Wasm).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = InMemoryNodeInfoStore::new(Duration::from_secs(60));
    let node = docker_node();
    store.add(node.clone()).await.unwrap();

    store.delete(&node.peer_id).await.unwrap();
    store.delete(&node.peer_id).await.unwrap();
    store.delete(&PeerId::random()).await.unwrap();
    assert!(store.list_for_engine(EngineType::Docker).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_requester_records_are_ignored() {
    let store = InMemoryNodeInfoStore::new(Duration::from_secs(60));
    let requester = NodeInfo::requester(PeerId::random());
    store.add(requester.clone()).await.unwrap();

    assert!(assert_ok!(store.list().await).is_empty());
    assert_err!(store.get(&requester.peer_id).await);
}
