// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::state::{JobState, JobStateType};
use crate::job::Job;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobStoreError {
    #[error("Job {0} not found")]
    NotFound(String),
    #[error("Job {0} already exists")]
    AlreadyExists(String),
    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStateType,
        to: JobStateType,
    },
}

/// Persists submitted jobs and their matching state.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: Job) -> Result<(), JobStoreError>;
    async fn get_job(&self, job_id: &str) -> Result<Job, JobStoreError>;
    /// Replaces the stored state. A terminal job cannot change state again.
    async fn update_job_state(&self, state: JobState) -> Result<(), JobStoreError>;
    async fn get_job_state(&self, job_id: &str) -> Result<JobState, JobStoreError>;
}

#[derive(Debug, Default)]
struct Jobs {
    jobs: HashMap<String, Job>,
    states: HashMap<String, JobState>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    inner: Arc<RwLock<Jobs>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.jobs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create_job(&self, job: Job) -> Result<(), JobStoreError> {
        let mut inner = self.inner.write().await;
        if inner.jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }
        debug!("Storing job {}", job.id);
        inner.states.insert(job.id.clone(), JobState::new(&job.id));
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job, JobStoreError> {
        self.inner
            .read()
            .await
            .jobs
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))
    }

    async fn update_job_state(&self, state: JobState) -> Result<(), JobStoreError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .states
            .get_mut(&state.job_id)
            .ok_or_else(|| JobStoreError::NotFound(state.job_id.clone()))?;
        if current.is_terminal() {
            return Err(JobStoreError::InvalidTransition {
                job_id: state.job_id.clone(),
                from: current.state,
                to: state.state,
            });
        }
        *current = state;
        Ok(())
    }

    async fn get_job_state(&self, job_id: &str) -> Result<JobState, JobStoreError> {
        self.inner
            .read()
            .await
            .states
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobStoreError::NotFound(job_id.to_string()))
    }
}
