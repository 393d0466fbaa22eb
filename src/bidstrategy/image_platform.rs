// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::{BidStrategy, BidStrategyError, BidStrategyRequest, BidStrategyResponse};
use crate::docker::{host_platforms, ImageInspector, Platform};
use crate::node_info::EngineType;

/// Bids on docker jobs only when the image was built for a platform this
/// node can execute.
///
/// Failing to resolve the image's platforms (registry unreachable, unknown
/// image, malformed reference) is an error rather than a decline, so the
/// requester can tell "cannot run this" from "could not check".
pub struct ImagePlatformBidStrategy {
    inspector: Arc<dyn ImageInspector>,
    supported: Vec<Platform>,
}

impl ImagePlatformBidStrategy {
    pub fn new(inspector: Arc<dyn ImageInspector>) -> Self {
        Self::with_platforms(inspector, host_platforms())
    }

    pub fn with_platforms(inspector: Arc<dyn ImageInspector>, supported: Vec<Platform>) -> Self {
        Self {
            inspector,
            supported,
        }
    }

    pub fn supported_platforms(&self) -> &[Platform] {
        &self.supported
    }
}

#[async_trait]
impl BidStrategy for ImagePlatformBidStrategy {
    fn name(&self) -> &str {
        "image_platform"
    }

    async fn should_bid(
        &self,
        request: &BidStrategyRequest,
    ) -> Result<BidStrategyResponse, BidStrategyError> {
        if request.job.engine() != EngineType::Docker {
            return Ok(BidStrategyResponse::bid("not a docker job"));
        }

        let image = request.job.engine_spec.image().ok_or_else(|| {
            BidStrategyError::evaluation_failed(self.name(), "docker job without an image")
        })?;

        let image_platforms = self
            .inspector
            .platforms(image)
            .await
            .map_err(|e| BidStrategyError::evaluation_failed(self.name(), e))?;
        debug!("Image {} declares platforms {:?}", image, image_platforms);

        let matched = image_platforms.iter().find(|image_platform| {
            self.supported
                .iter()
                .any(|supported| supported.is_compatible_with(image_platform))
        });

        match matched {
            Some(platform) => Ok(BidStrategyResponse::bid(format!(
                "image {} supports platform {}",
                image, platform
            ))),
            None => Ok(BidStrategyResponse::decline(format!(
                "node cannot run image {}: image platforms [{}], node platforms [{}]",
                image,
                join_platforms(&image_platforms),
                join_platforms(&self.supported)
            ))),
        }
    }
}

fn join_platforms(platforms: &[Platform]) -> String {
    platforms
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
