// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use chrono::{DateTime, Utc};
use libp2p::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStateType {
    New,
    InProgress,
    Completed,
    Error,
    BidRejected,
}

impl JobStateType {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStateType::Completed | JobStateType::Error | JobStateType::BidRejected
        )
    }
}

impl fmt::Display for JobStateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStateType::New => "New",
            JobStateType::InProgress => "InProgress",
            JobStateType::Completed => "Completed",
            JobStateType::Error => "Error",
            JobStateType::BidRejected => "BidRejected",
        };
        f.write_str(name)
    }
}

/// What happened with one peer for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerBidOutcome {
    /// Awarded, execution report outstanding.
    Pending,
    /// Awarded and finished successfully.
    Accepted,
    /// Declined by the peer, or a bid the requester did not select.
    Rejected,
    /// The peer could not evaluate the job, or its execution failed.
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub state: JobStateType,
    pub peers: BTreeMap<PeerId, PeerBidOutcome>,
    /// Positive bids that arrived inside the window.
    pub bids_received: usize,
    /// Explicit `should_bid = false` answers.
    pub rejections: usize,
    /// Answers from peers that could not evaluate the job.
    pub evaluation_errors: usize,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobStateType::New,
            peers: BTreeMap::new(),
            bids_received: 0,
            rejections: 0,
            evaluation_errors: 0,
            message: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn set_peer(&mut self, peer_id: PeerId, outcome: PeerBidOutcome) {
        self.peers.insert(peer_id, outcome);
        self.updated_at = Utc::now();
    }

    pub fn transition(&mut self, state: JobStateType, message: Option<String>) {
        self.state = state;
        self.message = message;
        self.updated_at = Utc::now();
    }

    /// Peers that were awarded the job, in any outcome.
    pub fn awarded_peers(&self) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, outcome)| {
                matches!(
                    outcome,
                    PeerBidOutcome::Pending | PeerBidOutcome::Accepted | PeerBidOutcome::Error
                )
            })
            .map(|(peer, _)| *peer)
            .collect()
    }

    pub fn peers_with(&self, outcome: PeerBidOutcome) -> Vec<PeerId> {
        self.peers
            .iter()
            .filter(|(_, o)| **o == outcome)
            .map(|(peer, _)| *peer)
            .collect()
    }
}
