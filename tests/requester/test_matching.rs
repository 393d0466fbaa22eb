// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use fabstir_compute_node::compute::{ComputeNode, NoopExecutor};
use fabstir_compute_node::job::{EngineSpec, Job};
use fabstir_compute_node::node_info::EngineType;
use fabstir_compute_node::requester::{
    CoordinatorConfig, CoordinatorError, JobStateType, PeerBidOutcome, SelectionPolicy,
};
use std::sync::Arc;

use super::common::{basic_chain, node_info, noop_node, window, Stack};

#[tokio::test]
async fn test_job_completes_on_target_concurrency() {
    let stack = Stack::new();
    for _ in 0..3 {
        stack.add_node(noop_node(&[EngineType::Noop]), true).await;
    }
    let coordinator = stack.coordinator(window(1_000));

    let job = Job::new(EngineSpec::new(EngineType::Noop)).with_concurrency(2);
    let state = coordinator.submit(job.clone()).await.unwrap();

    assert_eq!(state.state, JobStateType::Completed);
    assert_eq!(state.peers_with(PeerBidOutcome::Accepted).len(), 2);
    assert_eq!(coordinator.job_state(&job.id).await.unwrap(), state);
}

#[tokio::test]
async fn test_announcement_is_scoped_to_registered_peers() {
    let stack = Stack::new();
    let registered = stack.add_node(noop_node(&[EngineType::Noop]), true).await;
    let unregistered = stack.add_node(noop_node(&[EngineType::Noop]), false).await;
    let coordinator = stack.coordinator(window(1_000));

    let state = coordinator
        .submit(Job::new(EngineSpec::new(EngineType::Noop)))
        .await
        .unwrap();
    assert_eq!(state.awarded_peers(), vec![registered.peer_id()]);
    assert!(!state.peers.contains_key(&unregistered.peer_id()));
}

#[tokio::test]
async fn test_scoped_announcement_can_fall_short() {
    let stack = Stack::new();
    stack.add_node(noop_node(&[EngineType::Noop]), true).await;
    stack.add_node(noop_node(&[EngineType::Noop]), false).await;
    let coordinator = stack.coordinator(window(1_000));

    let job = Job::new(EngineSpec::new(EngineType::Noop)).with_concurrency(2);
    let err = coordinator.submit(job.clone()).await.unwrap_err();
    assert_eq!(
        err,
        CoordinatorError::InsufficientBids {
            job_id: job.id.clone(),
            received: 1,
            required: 2,
        }
    );
    assert_eq!(
        coordinator.job_state(&job.id).await.unwrap().state,
        JobStateType::BidRejected
    );
}

#[tokio::test]
async fn test_always_broadcast_reaches_unregistered_nodes() {
    let stack = Stack::new();
    stack.add_node(noop_node(&[EngineType::Noop]), true).await;
    stack.add_node(noop_node(&[EngineType::Noop]), false).await;
    let coordinator = stack.coordinator(CoordinatorConfig {
        always_broadcast: true,
        ..window(1_000)
    });

    let job = Job::new(EngineSpec::new(EngineType::Noop)).with_concurrency(2);
    let state = coordinator.submit(job).await.unwrap();
    assert_eq!(state.awarded_peers().len(), 2);
}

#[tokio::test]
async fn test_empty_registry_falls_back_to_broadcast() {
    let stack = Stack::new();
    let node = stack.add_node(noop_node(&[EngineType::Noop]), false).await;
    let coordinator = stack.coordinator(window(1_000));

    let state = coordinator
        .submit(Job::new(EngineSpec::new(EngineType::Noop)))
        .await
        .unwrap();
    assert_eq!(state.awarded_peers(), vec![node.peer_id()]);
}

#[tokio::test]
async fn test_capacity_policy_awards_least_loaded_node() {
    let stack = Stack::new();
    let mut peers = Vec::new();
    for cpu in [1.0, 16.0, 4.0] {
        let node = ComputeNode::new(
            node_info(&[EngineType::Noop], cpu),
            basic_chain(),
            Arc::new(NoopExecutor::new()),
        );
        peers.push(stack.add_node(node, true).await.peer_id());
    }
    let coordinator = stack.coordinator(CoordinatorConfig {
        selection_policy: SelectionPolicy::MostAvailableCapacity,
        ..window(1_000)
    });

    let state = coordinator
        .submit(Job::new(EngineSpec::new(EngineType::Noop)))
        .await
        .unwrap();
    assert_eq!(state.peers_with(PeerBidOutcome::Accepted), vec![peers[1]]);
    assert_eq!(state.peers_with(PeerBidOutcome::Rejected).len(), 2);
}

#[tokio::test]
async fn test_unknown_job_state() {
    let stack = Stack::new();
    let coordinator = stack.coordinator(window(100));
    assert!(matches!(
        coordinator.job_state("missing").await,
        Err(CoordinatorError::JobStore(_))
    ));
}
