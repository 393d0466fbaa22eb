// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use fabstir_compute_node::bidstrategy::{
    BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse, ChainedBidStrategy,
};
use fabstir_compute_node::job::{EngineSpec, Job};
use fabstir_compute_node::node_info::{EngineType, NodeInfo};
use libp2p::PeerId;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Strategy with a fixed answer that counts how often it ran.
struct Fixed {
    name: &'static str,
    answer: Result<bool, ()>,
    calls: Arc<AtomicUsize>,
}

impl Fixed {
    fn new(name: &'static str, answer: Result<bool, ()>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                answer,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl BidStrategy for Fixed {
    fn name(&self) -> &str {
        self.name
    }

    async fn should_bid(
        &self,
        _request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Ok(true) => Ok(BidStrategyResponse::bid(format!("{} says yes", self.name))),
            Ok(false) => Ok(BidStrategyResponse::decline(format!("{} says no", self.name))),
            Err(()) => Err(BidStrategyError::evaluation_failed(self.name, "backend unavailable")),
        }
    }
}

struct Slow;

#[async_trait]
impl BidStrategy for Slow {
    fn name(&self) -> &str {
        "slow"
    }

    async fn should_bid(
        &self,
        _request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(BidStrategyResponse::bid("eventually"))
    }
}

fn request() -> BidStrategyRequest {
    BidStrategyRequest::new(
        Job::new(EngineSpec::new(EngineType::Noop)),
        NodeInfo::compute(PeerId::random()).with_engines([EngineType::Noop]),
    )
}

#[tokio::test]
async fn test_all_positive_bids() {
    let (a, _) = Fixed::new("a", Ok(true));
    let (b, _) = Fixed::new("b", Ok(true));
    let chain = ChainedBidStrategy::new().with_strategy(a).with_strategy(b);

    let response = chain.should_bid(&request()).await.unwrap();
    assert!(response.should_bid);
}

#[tokio::test]
async fn test_empty_chain_bids() {
    let chain = ChainedBidStrategy::new();
    assert!(chain.is_empty());
    assert!(chain.should_bid(&request()).await.unwrap().should_bid);
}

#[tokio::test]
async fn test_first_negative_short_circuits() {
    let (a, a_calls) = Fixed::new("a", Ok(true));
    let (b, _) = Fixed::new("b", Ok(false));
    let (c, c_calls) = Fixed::new("c", Ok(true));
    let chain = ChainedBidStrategy::new()
        .with_strategy(a)
        .with_strategy(b)
        .with_strategy(c);

    let response = chain.should_bid(&request()).await.unwrap();
    assert!(!response.should_bid);
    assert_eq!(response.reason, "b says no");
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_is_not_a_negative() {
    let (a, _) = Fixed::new("a", Err(()));
    let (b, b_calls) = Fixed::new("b", Ok(false));
    let chain = ChainedBidStrategy::new().with_strategy(a).with_strategy(b);

    let err = chain.should_bid(&request()).await.unwrap_err();
    assert_eq!(
        err,
        BidStrategyError::EvaluationFailed {
            strategy: "a".into(),
            reason: "backend unavailable".into(),
        }
    );
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_negative_before_error_wins() {
    let (a, _) = Fixed::new("a", Ok(false));
    let (b, b_calls) = Fixed::new("b", Err(()));
    let chain = ChainedBidStrategy::new().with_strategy(a).with_strategy(b);

    let response = chain.should_bid(&request()).await.unwrap();
    assert!(!response.should_bid);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_exceeded_is_an_error() {
    let chain = ChainedBidStrategy::new()
        .with_strategy(Slow)
        .with_timeout(Duration::from_millis(500));

    assert_eq!(
        chain.should_bid(&request()).await,
        Err(BidStrategyError::Timeout(Duration::from_millis(500)))
    );
}

#[tokio::test]
async fn test_shared_strategy_instances() {
    let (a, calls) = Fixed::new("a", Ok(true));
    let shared: Arc<dyn BidStrategy> = Arc::new(a);
    let first = ChainedBidStrategy::new().with_shared_strategy(shared.clone());
    let second = ChainedBidStrategy::new().with_shared_strategy(shared);

    first.should_bid(&request()).await.unwrap();
    second.should_bid(&request()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
