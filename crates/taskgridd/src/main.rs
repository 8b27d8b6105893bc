//! taskgridd — the adaptive TaskManager scheduler daemon.
//!
//! Watches for pending Flink TaskManager pods claimed via
//! `schedulerName: adaptive-scheduler`, places each one with the currently
//! active strategy, and adapts the strategy to cluster CPU load.
//!
//! Strategy behavior is configured through the environment
//! (`CPU_LOW_THRESHOLD`, `CPU_HIGH_THRESHOLD`, `STRATEGY_COOLDOWN`,
//! `STRATEGY_CASCADE`, `FIXED_STRATEGY`); the flags below only tune loop
//! timing. Exits 0 on graceful shutdown, 1 when cluster credentials cannot
//! be loaded.

use anyhow::Context;
use clap::Parser;
use std::time::Duration;
use taskgrid_core::{Config, Orchestrator};
use taskgrid_kube::KubeOrchestrator;
use taskgrid_metrics::{MetricsApiFetcher, NodeCpuSource};
use taskgrid_scheduler::Scheduler;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "taskgridd", about = "Adaptive Flink TaskManager scheduler for Kubernetes")]
struct Cli {
    /// Seconds between scheduling passes.
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Seconds to back off after a failed pass.
    #[arg(long)]
    error_backoff: Option<u64>,

    /// Seconds a cached node-CPU sample stays fresh.
    #[arg(long)]
    metrics_cache_ttl: Option<u64>,

    /// Bound in seconds on every API request.
    #[arg(long)]
    request_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,taskgrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(secs) = cli.poll_interval {
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.error_backoff {
        config.error_backoff = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.metrics_cache_ttl {
        config.metrics_cache_ttl = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.request_timeout {
        config.request_timeout = Duration::from_secs(secs);
    }

    log_banner(&config);

    // Startup fatal: without credentials there is nothing to schedule against.
    let client = kube::Client::try_default()
        .await
        .context("failed to load cluster credentials")?;

    let orchestrator = KubeOrchestrator::new(client.clone(), config.request_timeout);
    let source = NodeCpuSource::new(
        MetricsApiFetcher::new(client, config.request_timeout),
        config.metrics_cache_ttl,
    );
    source.probe().await;
    log_cluster_status(&orchestrator, &source).await;

    let mut scheduler = Scheduler::new(orchestrator, source, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;

    println!("{}", scheduler.render_statistics());
    Ok(())
}

fn log_banner(config: &Config) {
    info!(
        cascade = %config.cascade,
        cpu_low_threshold = config.cpu_low_threshold,
        cpu_high_threshold = config.cpu_high_threshold,
        cooldown_secs = config.cooldown.as_secs(),
        poll_interval_secs = config.poll_interval.as_secs(),
        "taskgridd starting"
    );
    match config.fixed_strategy {
        Some(strategy) => info!(%strategy, "fixed-strategy mode"),
        None => info!("adaptive mode, initial strategy FCFS"),
    }
}

/// One-time cluster overview before the loop starts.
async fn log_cluster_status(
    orchestrator: &KubeOrchestrator,
    source: &NodeCpuSource<MetricsApiFetcher>,
) {
    info!(
        metrics_available = source.metrics_available(),
        "cluster metrics status"
    );
    match orchestrator.list_nodes().await {
        Ok(nodes) => {
            for node in &nodes {
                let cpu = source.node_cpu_percent(&node.name).await;
                let memory = source.node_memory_percent(&node.name).await;
                info!(
                    node = %node.name,
                    ready = node.ready,
                    cpu_percent = cpu,
                    memory_percent = memory,
                    "node status"
                );
            }
            info!(
                cluster_cpu_percent = source.cluster_cpu_percent().await,
                nodes = nodes.len(),
                "cluster average"
            );
        }
        Err(err) => warn!(error = %err, "could not list nodes for the startup overview"),
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
