// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod devstack;
pub mod inspect;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::NodeConfig;

/// Fabstir Compute Node CLI
#[derive(Parser, Debug)]
#[command(name = "fabstir-compute-node")]
#[command(version)]
#[command(about = "Node discovery and bidding tools for the Fabstir compute network", long_about = None)]
pub struct Cli {
    /// TOML config file. Environment variables override its values.
    #[arg(long, global = true, env = "NODE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a requester and in-memory compute nodes, then submit one job
    Devstack(devstack::DevstackArgs),

    /// Show the platforms a container image was built for
    InspectImage(inspect::InspectArgs),

    /// Print the effective configuration
    ShowConfig,
}

/// Defaults, then the config file if any, then environment overrides.
pub fn load_config(path: Option<&PathBuf>) -> Result<NodeConfig> {
    let mut config = match path {
        Some(path) => NodeConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;
    match cli.command {
        Commands::Devstack(args) => devstack::run(args, config).await,
        Commands::InspectImage(args) => inspect::run(args, config).await,
        Commands::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
