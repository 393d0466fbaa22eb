// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Eligibility predicates a compute node runs before bidding on a job.
//!
//! Each [`BidStrategy`] answers one question about a job and the node's own
//! capability record. A negative [`BidStrategyResponse`] is a definitive "do
//! not bid". A [`BidStrategyError`] means the strategy could not decide, and
//! the caller must not read it as a negative.

pub mod capacity;
pub mod chained;
pub mod engine;
pub mod image_platform;
pub mod labels;
pub mod locality;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::job::Job;
use crate::node_info::NodeInfo;

pub use capacity::CapacityBidStrategy;
pub use chained::ChainedBidStrategy;
pub use engine::EngineBidStrategy;
pub use image_platform::ImagePlatformBidStrategy;
pub use labels::LabelsBidStrategy;
pub use locality::{InMemoryStorageProvider, InputLocalityBidStrategy, StorageProvider};

/// A job plus the evaluating node's own capability record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidStrategyRequest {
    pub job: Job,
    pub node: NodeInfo,
}

impl BidStrategyRequest {
    pub fn new(job: Job, node: NodeInfo) -> Self {
        Self { job, node }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidStrategyResponse {
    pub should_bid: bool,
    pub reason: String,
}

impl BidStrategyResponse {
    pub fn bid(reason: impl Into<String>) -> Self {
        Self {
            should_bid: true,
            reason: reason.into(),
        }
    }

    pub fn decline(reason: impl Into<String>) -> Self {
        Self {
            should_bid: false,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BidStrategyError {
    #[error("{strategy} could not evaluate the job: {reason}")]
    EvaluationFailed { strategy: String, reason: String },
    #[error("Bid evaluation did not finish within {0:?}")]
    Timeout(Duration),
}

impl BidStrategyError {
    pub fn evaluation_failed(strategy: &str, reason: impl ToString) -> Self {
        BidStrategyError::EvaluationFailed {
            strategy: strategy.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
pub trait BidStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError>;
}
