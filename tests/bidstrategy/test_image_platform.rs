// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use fabstir_compute_node::bidstrategy::{
    BidStrategy, BidStrategyError, BidStrategyRequest, ChainedBidStrategy, EngineBidStrategy,
    ImagePlatformBidStrategy,
};
use fabstir_compute_node::docker::{ImageInspector, InspectError, Platform, StaticImageInspector};
use fabstir_compute_node::job::{EngineSpec, Job};
use fabstir_compute_node::node_info::{EngineType, NodeInfo};
use libp2p::PeerId;
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Inspector {}

    #[async_trait]
    impl ImageInspector for Inspector {
        async fn platforms(&self, image: &str) -> Result<Vec<Platform>, InspectError>;
    }
}

fn linux_node() -> NodeInfo {
    NodeInfo::compute(PeerId::random()).with_engines([EngineType::Docker])
}

fn docker_request(image: &str) -> BidStrategyRequest {
    BidStrategyRequest::new(Job::new(EngineSpec::docker(image)), linux_node())
}

fn windows() -> Platform {
    Platform::new("windows", "amd64")
}

#[tokio::test]
async fn test_portable_linux_image_bids() {
    let mut inspector = MockInspector::new();
    inspector
        .expect_platforms()
        .withf(|image| image == "ubuntu")
        .times(1)
        .returning(|_| Ok(vec![Platform::linux_amd64(), Platform::new("linux", "arm64")]));
    let strategy =
        ImagePlatformBidStrategy::with_platforms(Arc::new(inspector), vec![Platform::linux_amd64()]);

    let response = strategy.should_bid(&docker_request("ubuntu")).await.unwrap();
    assert!(response.should_bid, "{}", response.reason);
}

#[tokio::test]
async fn test_windows_only_image_declines_without_error() {
    let mut inspector = MockInspector::new();
    inspector
        .expect_platforms()
        .returning(|_| Ok(vec![Platform::new("windows", "amd64")]));
    let strategy =
        ImagePlatformBidStrategy::with_platforms(Arc::new(inspector), vec![Platform::linux_amd64()]);

    let response = strategy
        .should_bid(&docker_request("mcr.microsoft.com/windows:ltsc2019"))
        .await
        .unwrap();
    assert!(!response.should_bid);
    assert!(response.reason.contains("windows/amd64"));
    assert!(response.reason.contains("linux/amd64"));
}

#[tokio::test]
async fn test_windows_node_runs_windows_image() {
    let inspector = StaticImageInspector::new()
        .with_image("mcr.microsoft.com/windows:ltsc2019", vec![windows()]);
    let strategy = ImagePlatformBidStrategy::with_platforms(Arc::new(inspector), vec![windows()]);

    let response = strategy
        .should_bid(&docker_request("mcr.microsoft.com/windows:ltsc2019"))
        .await
        .unwrap();
    assert!(response.should_bid);
}

#[tokio::test]
async fn test_inspector_failure_is_an_error() {
    let mut inspector = MockInspector::new();
    inspector.expect_platforms().returning(|_| {
        Err(InspectError::Registry {
            status: 503,
            message: "service unavailable".into(),
        })
    });
    let strategy =
        ImagePlatformBidStrategy::with_platforms(Arc::new(inspector), vec![Platform::linux_amd64()]);

    match strategy.should_bid(&docker_request("ubuntu")).await {
        Err(BidStrategyError::EvaluationFailed { strategy, reason }) => {
            assert_eq!(strategy, "image_platform");
            assert!(reason.contains("503"));
        }
        other => panic!("expected an evaluation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_docker_job_without_image_is_an_error() {
    let mut inspector = MockInspector::new();
    inspector.expect_platforms().never();
    let strategy =
        ImagePlatformBidStrategy::with_platforms(Arc::new(inspector), vec![Platform::linux_amd64()]);

    let request = BidStrategyRequest::new(Job::new(EngineSpec::new(EngineType::Docker)), linux_node());
    assert!(strategy.should_bid(&request).await.is_err());
}

#[tokio::test]
async fn test_non_docker_jobs_skip_inspection() {
    let mut inspector = MockInspector::new();
    inspector.expect_platforms().never();
    let strategy =
        ImagePlatformBidStrategy::with_platforms(Arc::new(inspector), vec![Platform::linux_amd64()]);

    let request = BidStrategyRequest::new(
        Job::new(EngineSpec::new(EngineType::Wasm)),
        NodeInfo::compute(PeerId::random()).with_engines([EngineType::Wasm]),
    );
    assert!(strategy.should_bid(&request).await.unwrap().should_bid);
}

#[tokio::test]
async fn test_engine_check_runs_before_inspection() {
    let mut inspector = MockInspector::new();
    inspector.expect_platforms().never();
    let chain = ChainedBidStrategy::new()
        .with_strategy(EngineBidStrategy)
        .with_strategy(ImagePlatformBidStrategy::with_platforms(
            Arc::new(inspector),
            vec![Platform::linux_amd64()],
        ));

    let request = BidStrategyRequest::new(
        Job::new(EngineSpec::docker("ubuntu")),
        NodeInfo::compute(PeerId::random()).with_engines([EngineType::Wasm]),
    );
    let response = chain.should_bid(&request).await.unwrap();
    assert!(!response.should_bid);
    assert!(response.reason.contains("docker"));
}
