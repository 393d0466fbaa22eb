// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use crate::transport::BidResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Bids in arrival order.
    #[default]
    FirstN,
    /// Bids from nodes with the most free capacity first.
    MostAvailableCapacity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityWeights {
    pub cpu: f64,    // Default: 0.5
    pub memory: f64, // Default: 0.3
    pub disk: f64,   // Default: 0.2
}

impl Default for CapacityWeights {
    fn default() -> Self {
        Self {
            cpu: 0.5,
            memory: 0.3,
            disk: 0.2,
        }
    }
}

/// Picks which positive bids get awarded.
#[derive(Debug, Clone, Default)]
pub struct BidSelector {
    policy: SelectionPolicy,
    weights: CapacityWeights,
}

impl BidSelector {
    pub fn new(policy: SelectionPolicy) -> Self {
        Self {
            policy,
            weights: CapacityWeights::default(),
        }
    }

    pub fn with_weights(mut self, weights: CapacityWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Returns at most `count` bids. Negative and errored responses are never
    /// selected.
    pub fn select(&self, bids: &[BidResponse], count: usize) -> Vec<BidResponse> {
        let eligible: Vec<&BidResponse> = bids
            .iter()
            .filter(|bid| bid.should_bid && !bid.is_error())
            .collect();
        if eligible.is_empty() || count == 0 {
            return Vec::new();
        }

        let selected: Vec<BidResponse> = match self.policy {
            SelectionPolicy::FirstN => eligible.into_iter().take(count).cloned().collect(),
            SelectionPolicy::MostAvailableCapacity => {
                let mut scored: Vec<(&BidResponse, f64)> = eligible
                    .iter()
                    .map(|bid| (*bid, self.capacity_score(bid, &eligible)))
                    .collect();
                // Stable, so ties keep arrival order.
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
                scored
                    .into_iter()
                    .take(count)
                    .map(|(bid, _)| bid.clone())
                    .collect()
            }
        };

        debug!(
            "Selected {} of {} bid(s) with {:?}",
            selected.len(),
            bids.len(),
            self.policy
        );
        selected
    }

    /// Weighted free capacity, each dimension normalised by the largest value
    /// among the competing bids. Result is in 0..=1.
    pub fn capacity_score(&self, bid: &BidResponse, competing: &[&BidResponse]) -> f64 {
        let max_cpu = competing
            .iter()
            .map(|b| b.available_capacity.cpu)
            .fold(0.0_f64, f64::max);
        let max_memory = competing
            .iter()
            .map(|b| b.available_capacity.memory)
            .max()
            .unwrap_or(0);
        let max_disk = competing
            .iter()
            .map(|b| b.available_capacity.disk)
            .max()
            .unwrap_or(0);

        let ratio = |value: f64, max: f64| if max > 0.0 { value / max } else { 0.0 };
        let capacity = &bid.available_capacity;
        let total = ratio(capacity.cpu, max_cpu) * self.weights.cpu
            + ratio(capacity.memory as f64, max_memory as f64) * self.weights.memory
            + ratio(capacity.disk as f64, max_disk as f64) * self.weights.disk;

        total.clamp(0.0, 1.0)
    }
}
