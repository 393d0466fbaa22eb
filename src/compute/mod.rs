// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Compute-node side of matching: decide whether to bid on announced jobs
//! and run the ones that get awarded.

pub mod publisher;

use async_trait::async_trait;
use libp2p::PeerId;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::bidstrategy::{
    BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse, ChainedBidStrategy,
};
use crate::job::Job;
use crate::node_info::{EngineType, NodeInfo};
use crate::transport::{BidResponse, ExecutionOutcome, ExecutionReport, JobAnnouncement};

pub use publisher::NodeInfoPublisher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Engine {0} is not available on this node")]
    EngineUnavailable(EngineType),
    #[error("Execution failed: {0}")]
    Failed(String),
}

/// Runs awarded jobs.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, job: &Job) -> Result<String, ExecutorError>;
}

/// Executor that completes every job after an optional delay.
#[derive(Debug, Clone, Default)]
pub struct NoopExecutor {
    duration: Duration,
}

impl NoopExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl Executor for NoopExecutor {
    async fn run(&self, job: &Job) -> Result<String, ExecutorError> {
        if !self.duration.is_zero() {
            tokio::time::sleep(self.duration).await;
        }
        Ok(format!("job {} completed", job.id))
    }
}

pub struct ComputeNode {
    peer_id: PeerId,
    node_info: RwLock<NodeInfo>,
    strategy: ChainedBidStrategy,
    executor: Arc<dyn Executor>,
    announce_rejections: bool,
}

impl ComputeNode {
    pub fn new(node_info: NodeInfo, strategy: ChainedBidStrategy, executor: Arc<dyn Executor>) -> Self {
        Self {
            peer_id: node_info.peer_id,
            node_info: RwLock::new(node_info),
            strategy,
            executor,
            announce_rejections: false,
        }
    }

    /// Also answer announcements the node declines, with `should_bid = false`.
    pub fn with_announce_rejections(mut self, announce_rejections: bool) -> Self {
        self.announce_rejections = announce_rejections;
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Snapshot of the node's current capability record.
    pub async fn node_info(&self) -> NodeInfo {
        self.node_info.read().await.clone()
    }

    /// Replaces the capability record. The peer id is kept.
    pub async fn update_node_info(&self, mut node_info: NodeInfo) {
        node_info.peer_id = self.peer_id;
        *self.node_info.write().await = node_info;
    }

    /// Runs the bid chain against the node's own record.
    pub async fn evaluate(&self, job: &Job) -> Result<BidStrategyResponse, BidStrategyError> {
        let request = BidStrategyRequest::new(job.clone(), self.node_info().await);
        self.strategy.should_bid(&request).await
    }

    /// Answers an announcement. `None` means the node stays silent, which is
    /// what it does for declines and evaluation errors unless rejections are
    /// announced.
    pub async fn handle_announcement(&self, announcement: &JobAnnouncement) -> Option<BidResponse> {
        let job = &announcement.job;
        let (response, error) = match self.evaluate(job).await {
            Ok(response) => (response, None),
            Err(e) => {
                warn!("Node {} could not evaluate job {}: {}", self.peer_id, job.id, e);
                (BidStrategyResponse::decline("bid evaluation failed"), Some(e.to_string()))
            }
        };

        if !response.should_bid && !self.announce_rejections {
            debug!("Node {} declined job {}: {}", self.peer_id, job.id, response.reason);
            return None;
        }

        let available_capacity = self.node_info.read().await.compute_node_info.available_capacity;
        Some(BidResponse {
            job_id: job.id.clone(),
            peer_id: self.peer_id,
            should_bid: response.should_bid,
            reason: response.reason,
            error,
            available_capacity,
        })
    }

    /// Reserves capacity, runs the job and releases the capacity again.
    pub async fn execute(&self, job: Job) -> ExecutionReport {
        if let Err(reason) = self.reserve(&job).await {
            info!("Node {} declined awarded job {}: {}", self.peer_id, job.id, reason);
            return ExecutionReport::new(&job.id, self.peer_id, ExecutionOutcome::Declined { reason });
        }

        info!("Node {} executing job {}", self.peer_id, job.id);
        let outcome = match self.executor.run(&job).await {
            Ok(output) => ExecutionOutcome::Succeeded { output },
            Err(e) => {
                warn!("Node {} failed job {}: {}", self.peer_id, job.id, e);
                ExecutionOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };
        self.release(&job).await;

        ExecutionReport::new(&job.id, self.peer_id, outcome)
    }

    async fn reserve(&self, job: &Job) -> Result<(), String> {
        let mut node_info = self.node_info.write().await;
        if !node_info.supports_engine(job.engine()) {
            return Err(format!("engine {} is not supported", job.engine()));
        }
        let info = &mut node_info.compute_node_info;
        if !job.resources.fits_within(&info.available_capacity) {
            return Err(format!(
                "not enough available {}",
                job.resources
                    .exceeded_dimensions(&info.available_capacity)
                    .join(", ")
            ));
        }
        info.available_capacity = info.available_capacity.saturating_sub(&job.resources);
        Ok(())
    }

    async fn release(&self, job: &Job) {
        let mut node_info = self.node_info.write().await;
        let info = &mut node_info.compute_node_info;
        info.available_capacity = info
            .available_capacity
            .add_capped(&job.resources, &info.max_capacity);
    }
}
