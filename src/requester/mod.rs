// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod coordinator;
pub mod jobstore;
pub mod selection;
pub mod state;

pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError};
pub use jobstore::{InMemoryJobStore, JobStore, JobStoreError};
pub use selection::{BidSelector, CapacityWeights, SelectionPolicy};
pub use state::{JobState, JobStateType, PeerBidOutcome};
