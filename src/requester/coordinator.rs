// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use futures::future::join_all;
use libp2p::PeerId;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::jobstore::{JobStore, JobStoreError};
use super::selection::{BidSelector, SelectionPolicy};
use super::state::{JobState, JobStateType, PeerBidOutcome};
use crate::config::NodeConfig;
use crate::job::Job;
use crate::nodestore::NodeInfoStore;
use crate::transport::{
    AnnouncementScope, BidResponse, ExecutionOutcome, JobAnnouncement, Transport, TransportError,
};

/// Job-level failures. These are the only errors clients of the
/// coordinator see; registry and bid evaluation errors stay inside.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("No eligible bids for job {job_id} ({rejected} rejected, {errored} could not evaluate)")]
    NoEligibleBids {
        job_id: String,
        rejected: usize,
        errored: usize,
    },
    #[error("Job {job_id} needs {required} bid(s) but only {received} arrived")]
    InsufficientBids {
        job_id: String,
        received: usize,
        required: usize,
    },
    #[error("Execution of job {job_id} on {peer} failed: {reason}")]
    AwardedExecutionFailed {
        job_id: String,
        peer: PeerId,
        reason: String,
    },
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Job store error: {0}")]
    JobStore(#[from] JobStoreError),
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub bid_window: Duration,
    pub always_broadcast: bool,
    pub selection_policy: SelectionPolicy,
    /// Bound on each awarded execution. `None` waits for the report.
    pub award_timeout: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig::from(&NodeConfig::default())
    }
}

impl From<&NodeConfig> for CoordinatorConfig {
    fn from(config: &NodeConfig) -> Self {
        Self {
            bid_window: config.bid_window(),
            always_broadcast: config.always_broadcast,
            selection_policy: config.selection_policy,
            award_timeout: config.award_timeout(),
        }
    }
}

/// Requester-side matching: scopes an announcement with the registry,
/// collects bids for a bounded window, awards and waits for results.
pub struct Coordinator {
    requester: PeerId,
    config: CoordinatorConfig,
    node_store: Arc<dyn NodeInfoStore>,
    transport: Arc<dyn Transport>,
    job_store: Arc<dyn JobStore>,
    selector: BidSelector,
}

impl Coordinator {
    pub fn new(
        requester: PeerId,
        config: CoordinatorConfig,
        node_store: Arc<dyn NodeInfoStore>,
        transport: Arc<dyn Transport>,
        job_store: Arc<dyn JobStore>,
    ) -> Self {
        let selector = BidSelector::new(config.selection_policy);
        Self {
            requester,
            config,
            node_store,
            transport,
            job_store,
            selector,
        }
    }

    pub fn with_selector(mut self, selector: BidSelector) -> Self {
        self.selector = selector;
        self
    }

    /// Current bid and award state of a job.
    pub async fn job_state(&self, job_id: &str) -> Result<JobState, CoordinatorError> {
        Ok(self.job_store.get_job_state(job_id).await?)
    }

    /// Runs a job through matching and execution. Returns the final state
    /// when the job completed; every other terminal state is an error, and
    /// is also recorded in the job store.
    pub async fn submit(&self, mut job: Job) -> Result<JobState, CoordinatorError> {
        job.concurrency = job.concurrency.max(1);
        self.job_store.create_job(job.clone()).await?;
        let mut state = self.job_store.get_job_state(&job.id).await?;

        let scope = self.announcement_scope(&job).await;
        state.transition(JobStateType::InProgress, None);
        self.job_store.update_job_state(state.clone()).await?;

        let announcement = JobAnnouncement::new(job.clone(), self.requester);
        let responses = match self.transport.announce(announcement, scope).await {
            Ok(responses) => responses,
            Err(e) => {
                self.finish(&mut state, JobStateType::Error, e.to_string()).await?;
                return Err(e.into());
            }
        };

        let bids = self.collect_bids(&job, responses, &mut state).await;
        if bids.is_empty() {
            let err = CoordinatorError::NoEligibleBids {
                job_id: job.id.clone(),
                rejected: state.rejections,
                errored: state.evaluation_errors,
            };
            info!("{}", err);
            self.finish(&mut state, JobStateType::BidRejected, err.to_string()).await?;
            return Err(err);
        }
        if bids.len() < job.concurrency {
            let err = CoordinatorError::InsufficientBids {
                job_id: job.id.clone(),
                received: bids.len(),
                required: job.concurrency,
            };
            info!("{}", err);
            for bid in &bids {
                state.set_peer(bid.peer_id, PeerBidOutcome::Rejected);
            }
            self.finish(&mut state, JobStateType::BidRejected, err.to_string()).await?;
            return Err(err);
        }

        let selected = self.selector.select(&bids, job.concurrency);
        for bid in &bids {
            let outcome = if selected.iter().any(|s| s.peer_id == bid.peer_id) {
                PeerBidOutcome::Pending
            } else {
                PeerBidOutcome::Rejected
            };
            state.set_peer(bid.peer_id, outcome);
        }
        self.job_store.update_job_state(state.clone()).await?;

        self.award(&job, &selected, &mut state).await
    }

    async fn announcement_scope(&self, job: &Job) -> AnnouncementScope {
        if self.config.always_broadcast {
            return AnnouncementScope::Broadcast;
        }
        match self.node_store.list_for_engine(job.engine()).await {
            Ok(nodes) if !nodes.is_empty() => {
                debug!(
                    "Registry knows {} node(s) for engine {}",
                    nodes.len(),
                    job.engine()
                );
                AnnouncementScope::Peers(nodes.into_iter().map(|n| n.peer_id).collect())
            }
            Ok(_) => {
                debug!("No registered nodes for engine {}, broadcasting", job.engine());
                AnnouncementScope::Broadcast
            }
            Err(e) => {
                warn!("Registry lookup for job {} failed, broadcasting: {}", job.id, e);
                AnnouncementScope::Broadcast
            }
        }
    }

    /// Reads responses until the window closes, every reached node has
    /// answered, or enough bids arrived for first-N selection. Whatever is
    /// still in flight afterwards is dropped. Only a peer's first answer
    /// counts.
    async fn collect_bids(
        &self,
        job: &Job,
        mut responses: mpsc::Receiver<BidResponse>,
        state: &mut JobState,
    ) -> Vec<BidResponse> {
        let deadline = Instant::now() + self.config.bid_window;
        let mut bids = Vec::new();
        let mut answered = HashSet::new();

        loop {
            let response = match tokio::time::timeout_at(deadline, responses.recv()).await {
                Ok(Some(response)) => response,
                Ok(None) => {
                    debug!("All reached nodes answered for job {}", job.id);
                    break;
                }
                Err(_) => {
                    debug!("Bid window closed for job {}", job.id);
                    break;
                }
            };

            if response.job_id != job.id {
                warn!(
                    "Dropping response from {} for job {} while collecting {}",
                    response.peer_id, response.job_id, job.id
                );
                continue;
            }
            if !answered.insert(response.peer_id) {
                debug!(
                    "Ignoring repeated response from {} for job {}",
                    response.peer_id, job.id
                );
                continue;
            }

            if let Some(error) = &response.error {
                warn!(
                    "Node {} could not evaluate job {}: {}",
                    response.peer_id, job.id, error
                );
                state.evaluation_errors += 1;
                state.set_peer(response.peer_id, PeerBidOutcome::Error);
            } else if response.should_bid {
                state.bids_received += 1;
                bids.push(response);
                if self.selector.policy() == SelectionPolicy::FirstN
                    && bids.len() >= job.concurrency
                {
                    break;
                }
            } else {
                debug!(
                    "Node {} rejected job {}: {}",
                    response.peer_id, job.id, response.reason
                );
                state.rejections += 1;
                state.set_peer(response.peer_id, PeerBidOutcome::Rejected);
            }
        }
        bids
    }

    async fn award(
        &self,
        job: &Job,
        selected: &[BidResponse],
        state: &mut JobState,
    ) -> Result<JobState, CoordinatorError> {
        info!("Awarding job {} to {} node(s)", job.id, selected.len());
        let awards = selected.iter().map(|bid| {
            let peer = bid.peer_id;
            let job = job.clone();
            async move {
                let award = self.transport.award(peer, job);
                let result = match self.config.award_timeout {
                    Some(limit) => match tokio::time::timeout(limit, award).await {
                        Ok(result) => result.map_err(|e| e.to_string()),
                        Err(_) => Err(format!("no execution report within {:?}", limit)),
                    },
                    None => award.await.map_err(|e| e.to_string()),
                };
                (peer, result)
            }
        });

        let mut failure: Option<(PeerId, String)> = None;
        for (peer, result) in join_all(awards).await {
            let reason = match result {
                Ok(report) => match report.outcome {
                    ExecutionOutcome::Succeeded { .. } => None,
                    ExecutionOutcome::Failed { reason } => Some(reason),
                    ExecutionOutcome::Declined { reason } => Some(format!("declined award: {}", reason)),
                },
                Err(reason) => Some(reason),
            };
            match reason {
                None => state.set_peer(peer, PeerBidOutcome::Accepted),
                Some(reason) => {
                    warn!("Job {} failed on {}: {}", job.id, peer, reason);
                    state.set_peer(peer, PeerBidOutcome::Error);
                    if failure.is_none() {
                        failure = Some((peer, reason));
                    }
                }
            }
        }

        match failure {
            None => {
                info!("Job {} completed", job.id);
                state.transition(JobStateType::Completed, None);
                self.job_store.update_job_state(state.clone()).await?;
                Ok(state.clone())
            }
            Some((peer, reason)) => {
                let err = CoordinatorError::AwardedExecutionFailed {
                    job_id: job.id.clone(),
                    peer,
                    reason,
                };
                self.finish(state, JobStateType::Error, err.to_string()).await?;
                Err(err)
            }
        }
    }

    async fn finish(
        &self,
        state: &mut JobState,
        terminal: JobStateType,
        message: String,
    ) -> Result<(), CoordinatorError> {
        state.transition(terminal, Some(message));
        self.job_store.update_job_state(state.clone()).await?;
        Ok(())
    }
}
