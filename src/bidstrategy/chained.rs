// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse};

/// Ordered conjunction of strategies.
///
/// Stops at the first negative response or the first error. An optional
/// deadline bounds the whole chain; running past it is an error.
#[derive(Clone, Default)]
pub struct ChainedBidStrategy {
    strategies: Vec<Arc<dyn BidStrategy>>,
    timeout: Option<Duration>,
}

impl ChainedBidStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy<S: BidStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategies.push(Arc::new(strategy));
        self
    }

    pub fn with_shared_strategy(mut self, strategy: Arc<dyn BidStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    async fn evaluate_all(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        for strategy in &self.strategies {
            let response = strategy.should_bid(request).await.map_err(|e| {
                warn!("Bid strategy {} failed for job {}: {}", strategy.name(), request.job.id, e);
                e
            })?;
            if !response.should_bid {
                debug!(
                    "Bid strategy {} declined job {}: {}",
                    strategy.name(),
                    request.job.id,
                    response.reason
                );
                return Ok(response);
            }
        }
        Ok(BidStrategyResponse::bid(format!(
            "all {} bid checks passed",
            self.strategies.len()
        )))
    }
}

#[async_trait]
impl BidStrategy for ChainedBidStrategy {
    fn name(&self) -> &str {
        "chained"
    }

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.evaluate_all(request))
                .await
                .map_err(|_| BidStrategyError::Timeout(timeout))?,
            None => self.evaluate_all(request).await,
        }
    }
}
