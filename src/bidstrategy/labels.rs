// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;

use super::{BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse};

#[derive(Debug, Clone, Copy, Default)]
pub struct LabelsBidStrategy;

#[async_trait]
impl BidStrategy for LabelsBidStrategy {
    fn name(&self) -> &str {
        "labels"
    }

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        let unmatched: Vec<String> = request
            .job
            .node_selectors
            .iter()
            .filter(|selector| !selector.matches(&request.node.labels))
            .map(ToString::to_string)
            .collect();

        if unmatched.is_empty() {
            Ok(BidStrategyResponse::bid("node labels match job selectors"))
        } else {
            Ok(BidStrategyResponse::decline(format!(
                "node labels do not match selectors: {}",
                unmatched.join(", ")
            )))
        }
    }
}
