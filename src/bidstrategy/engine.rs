// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;

use super::{BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse};

/// Declines jobs for engines the node does not advertise.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineBidStrategy;

#[async_trait]
impl BidStrategy for EngineBidStrategy {
    fn name(&self) -> &str {
        "engine"
    }

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        let engine = request.job.engine();
        if request.node.supports_engine(engine) {
            Ok(BidStrategyResponse::bid(format!("node supports engine {}", engine)))
        } else {
            Ok(BidStrategyResponse::decline(format!(
                "node does not support engine {}",
                engine
            )))
        }
    }
}
