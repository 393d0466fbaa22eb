// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;
use libp2p::PeerId;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bidstrategy::{
    CapacityBidStrategy, ChainedBidStrategy, EngineBidStrategy, ImagePlatformBidStrategy,
    InMemoryStorageProvider, InputLocalityBidStrategy, LabelsBidStrategy,
};
use crate::compute::{ComputeNode, NodeInfoPublisher, NoopExecutor};
use crate::config::NodeConfig;
use crate::docker::{ImageInspector, Platform, RegistryImageInspector, StaticImageInspector};
use crate::job::{EngineSpec, Job, LabelSelector};
use crate::node_info::{EngineType, NodeInfo, ResourceUsage};
use crate::nodestore::InMemoryNodeInfoStore;
use crate::requester::{Coordinator, CoordinatorConfig, InMemoryJobStore};
use crate::transport::InMemoryNetwork;

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Args, Debug)]
pub struct DevstackArgs {
    /// Number of in-memory compute nodes
    #[arg(long, default_value_t = 3)]
    pub compute_nodes: usize,

    /// Docker image for the job. Without it a noop job is submitted.
    #[arg(long)]
    pub image: Option<String>,

    /// Number of nodes that must run the job
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,

    /// CPU cores the job requests
    #[arg(long, default_value_t = 0.5)]
    pub cpu: f64,

    /// Node selectors such as `zone=eu` or `!gpu`
    #[arg(long, value_delimiter = ',')]
    pub selector: Vec<String>,

    /// Resolve images against their real registries instead of the built-in table
    #[arg(long)]
    pub live_registry: bool,

    /// Simulated execution time in milliseconds
    #[arg(long, default_value_t = 100)]
    pub job_duration_ms: u64,
}

/// Images the devstack can resolve without network access.
fn offline_inspector() -> StaticImageInspector {
    StaticImageInspector::new()
        .with_image(
            "ubuntu",
            vec![Platform::linux_amd64(), Platform::new("linux", "arm64")],
        )
        .with_image(
            "mcr.microsoft.com/windows:ltsc2019",
            vec![Platform::new("windows", "amd64")],
        )
}

pub async fn run(args: DevstackArgs, config: NodeConfig) -> Result<()> {
    let store = Arc::new(InMemoryNodeInfoStore::new(config.node_info_ttl()));
    let network = InMemoryNetwork::new();
    let storage = Arc::new(InMemoryStorageProvider::new());
    let inspector: Arc<dyn ImageInspector> = if args.live_registry {
        Arc::new(RegistryImageInspector::new(config.registry_timeout())?)
    } else {
        Arc::new(offline_inspector())
    };

    let shutdown = CancellationToken::new();
    let mut publishers = Vec::with_capacity(args.compute_nodes);
    for index in 0..args.compute_nodes {
        let node_info = NodeInfo::compute(PeerId::random())
            .with_engines([EngineType::Docker, EngineType::Noop])
            .with_capacity(ResourceUsage::new(4.0, 8 * GIB, 100 * GIB))
            .with_labels([format!("node={}", index), format!("zone={}", if index % 2 == 0 { "eu" } else { "us" })]);

        let mut chain = ChainedBidStrategy::new()
            .with_strategy(EngineBidStrategy)
            .with_strategy(CapacityBidStrategy)
            .with_strategy(LabelsBidStrategy)
            .with_strategy(InputLocalityBidStrategy::new(storage.clone()))
            .with_strategy(ImagePlatformBidStrategy::new(inspector.clone()));
        if let Some(timeout) = config.bid_evaluation_timeout() {
            chain = chain.with_timeout(timeout);
        }

        let executor = Arc::new(NoopExecutor::with_duration(Duration::from_millis(
            args.job_duration_ms,
        )));
        let node = Arc::new(
            ComputeNode::new(node_info, chain, executor)
                .with_announce_rejections(config.announce_rejections),
        );
        info!("Started compute node {} ({})", index, node.peer_id());
        network.register(node.clone()).await;

        let publisher = NodeInfoPublisher::new(node, store.clone(), config.publish_interval());
        publisher.publish_once().await?;
        publishers.push(publisher.spawn(shutdown.clone()));
    }

    let coordinator = Coordinator::new(
        PeerId::random(),
        CoordinatorConfig::from(&config),
        store,
        Arc::new(network),
        Arc::new(InMemoryJobStore::new()),
    );

    let engine_spec = match &args.image {
        Some(image) => EngineSpec::docker(image.clone()),
        None => EngineSpec::new(EngineType::Noop),
    };
    let selectors = args
        .selector
        .iter()
        .map(|s| s.parse::<LabelSelector>())
        .collect::<Result<Vec<_>, _>>()?;
    let job = Job::new(engine_spec)
        .with_resources(ResourceUsage::new(args.cpu, GIB, 0))
        .with_concurrency(args.concurrency)
        .with_node_selectors(selectors);
    info!("Submitting job {}", job.id);

    match coordinator.submit(job.clone()).await {
        Ok(_) => info!("Job {} completed", job.id),
        Err(e) => warn!("Job {} did not complete: {}", job.id, e),
    }
    let state = coordinator.job_state(&job.id).await?;
    println!("{}", serde_json::to_string_pretty(&state)?);

    shutdown.cancel();
    for handle in publishers {
        handle.await?;
    }
    Ok(())
}
