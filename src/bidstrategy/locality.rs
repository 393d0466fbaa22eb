// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse};
use crate::job::{InputSource, Locality};

/// Answers whether an input is already stored on this node.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn has_local_copy(&self, input: &InputSource) -> anyhow::Result<bool>;
}

/// Set of locally pinned CIDs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorageProvider {
    pinned: Arc<RwLock<HashSet<String>>>,
}

impl InMemoryStorageProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pin(&self, cid: impl Into<String>) {
        self.pinned.write().await.insert(cid.into());
    }

    pub async fn unpin(&self, cid: &str) {
        self.pinned.write().await.remove(cid);
    }
}

#[async_trait]
impl StorageProvider for InMemoryStorageProvider {
    async fn has_local_copy(&self, input: &InputSource) -> anyhow::Result<bool> {
        Ok(self.pinned.read().await.contains(&input.cid))
    }
}

/// For `Locality::Local` jobs, bids only when every input is present locally.
pub struct InputLocalityBidStrategy {
    storage: Arc<dyn StorageProvider>,
}

impl InputLocalityBidStrategy {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl BidStrategy for InputLocalityBidStrategy {
    fn name(&self) -> &str {
        "input_locality"
    }

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        if request.job.locality == Locality::Anywhere || request.job.inputs.is_empty() {
            return Ok(BidStrategyResponse::bid("job accepts inputs from anywhere"));
        }

        for input in &request.job.inputs {
            let present = self
                .storage
                .has_local_copy(input)
                .await
                .map_err(|e| BidStrategyError::evaluation_failed(self.name(), e))?;
            if !present {
                return Ok(BidStrategyResponse::decline(format!(
                    "input {} is not stored locally",
                    input.cid
                )));
            }
        }
        Ok(BidStrategyResponse::bid("all inputs are stored locally"))
    }
}
