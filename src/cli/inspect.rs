// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;

use crate::config::NodeConfig;
use crate::docker::{host_platforms, ImageInspector, ImageReference, RegistryImageInspector};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Image reference, e.g. `ubuntu:22.04` or `mcr.microsoft.com/windows:ltsc2019`
    pub image: String,
}

pub async fn run(args: InspectArgs, config: NodeConfig) -> Result<()> {
    let reference = ImageReference::parse(&args.image)?;
    println!("Image:     {}", reference);

    let inspector = RegistryImageInspector::new(config.registry_timeout())?;
    let platforms = inspector.platforms(&args.image).await?;
    let host = host_platforms();

    for platform in &platforms {
        let runnable = host.iter().any(|h| h.is_compatible_with(platform));
        println!(
            "Platform:  {:<20} {}",
            platform.to_string(),
            if runnable { "runnable here" } else { "" }
        );
    }
    Ok(())
}
