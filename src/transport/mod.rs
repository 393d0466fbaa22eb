// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Messages exchanged between requester and compute nodes, and the
//! [`Transport`] seam that carries them.

pub mod inmemory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::job::Job;
use crate::node_info::ResourceUsage;

pub use inmemory::InMemoryNetwork;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAnnouncement {
    pub job: Job,
    pub requester: PeerId,
    pub announced_at: DateTime<Utc>,
}

impl JobAnnouncement {
    pub fn new(job: Job, requester: PeerId) -> Self {
        Self {
            job,
            requester,
            announced_at: Utc::now(),
        }
    }
}

/// Who receives an announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnouncementScope {
    Peers(Vec<PeerId>),
    Broadcast,
}

/// A compute node's answer to an announcement.
///
/// Nodes normally only answer when they want the job. A node configured to
/// announce rejections also answers with `should_bid = false`, and sets
/// `error` when it could not evaluate the job at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidResponse {
    pub job_id: String,
    pub peer_id: PeerId,
    pub should_bid: bool,
    pub reason: String,
    #[serde(default)]
    pub error: Option<String>,
    pub available_capacity: ResourceUsage,
}

impl BidResponse {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Succeeded { output: String },
    Failed { reason: String },
    /// The node no longer wanted the job when the award arrived.
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub job_id: String,
    pub peer_id: PeerId,
    pub outcome: ExecutionOutcome,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn new(job_id: impl Into<String>, peer_id: PeerId, outcome: ExecutionOutcome) -> Self {
        Self {
            job_id: job_id.into(),
            peer_id,
            outcome,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExecutionOutcome::Succeeded { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer {0} is not reachable")]
    UnknownPeer(PeerId),
    #[error("Delivery to {peer} failed: {reason}")]
    Delivery { peer: PeerId, reason: String },
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers the announcement and returns a stream of the bids it produces.
    /// The stream ends once every reached node has answered or stayed silent.
    async fn announce(
        &self,
        announcement: JobAnnouncement,
        scope: AnnouncementScope,
    ) -> Result<mpsc::Receiver<BidResponse>, TransportError>;

    /// Hands the job to an awarded peer and waits for its execution report.
    async fn award(&self, peer: PeerId, job: Job) -> Result<ExecutionReport, TransportError>;
}
