// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;

use super::{BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse};

/// Declines jobs whose resource requirements exceed the node's per-job limit
/// or what the node currently has free.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapacityBidStrategy;

#[async_trait]
impl BidStrategy for CapacityBidStrategy {
    fn name(&self) -> &str {
        "capacity"
    }

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        let required = &request.job.resources;
        if required.cpu.is_nan() || required.cpu < 0.0 {
            return Err(BidStrategyError::evaluation_failed(
                self.name(),
                format!("invalid cpu requirement {}", required.cpu),
            ));
        }

        let limit = request.node.job_limit();
        if !required.fits_within(&limit) {
            return Ok(BidStrategyResponse::decline(format!(
                "job exceeds the per-job limit on {} ({} > {})",
                required.exceeded_dimensions(&limit).join(", "),
                required,
                limit
            )));
        }

        let available = &request.node.compute_node_info.available_capacity;
        if !required.fits_within(available) {
            return Ok(BidStrategyResponse::decline(format!(
                "not enough available {} ({} > {})",
                required.exceeded_dimensions(available).join(", "),
                required,
                available
            )));
        }

        Ok(BidStrategyResponse::bid("node has enough capacity"))
    }
}
