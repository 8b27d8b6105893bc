//! The scheduling control loop.
//!
//! One logical task drives everything sequentially: discover pending pods,
//! place each one with the active strategy, evaluate the adaptive selector,
//! sleep. Binding is a cluster-wide single-writer operation, so there is
//! nothing to gain from parallelizing within a pass.

use crate::decision_log::{DecisionLog, SchedulingReport};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use taskgrid_core::{
    epoch_millis, BindError, Config, CpuSource, MetricsSnapshot, NodeRecord, Orchestrator,
    OrchestratorError, PlacementDecision, PodRecord, Strategy, StrategySwitch,
};
use taskgrid_strategy::{AdaptiveSelector, StrategySet};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// The adaptive scheduler: control loop plus all scheduling state.
pub struct Scheduler<O, M> {
    orchestrator: O,
    metrics: M,
    strategies: StrategySet,
    selector: AdaptiveSelector,
    /// Set when `FIXED_STRATEGY` pins one strategy for the whole run.
    fixed: Option<Strategy>,
    log: DecisionLog,
    switches: Vec<StrategySwitch>,
    /// Successful bindings since startup; readable from other tasks.
    bound_total: AtomicU64,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl<O: Orchestrator, M: CpuSource> Scheduler<O, M> {
    pub fn new(orchestrator: O, metrics: M, config: &Config) -> Self {
        Self {
            orchestrator,
            metrics,
            strategies: StrategySet::new(),
            selector: AdaptiveSelector::from_config(config, Instant::now()),
            fixed: config.fixed_strategy,
            log: DecisionLog::new(),
            switches: Vec::new(),
            bound_total: AtomicU64::new(0),
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
        }
    }

    /// The strategy decisions are currently made with.
    pub fn active_strategy(&self) -> Strategy {
        self.fixed.unwrap_or_else(|| self.selector.active())
    }

    /// Run until the shutdown channel flips.
    ///
    /// An in-flight pass completes before the loop exits, so the decision
    /// log and bandit statistics are consistent when the caller renders
    /// the shutdown report.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            strategy = %self.active_strategy(),
            fixed = self.fixed.is_some(),
            "scheduler loop starting"
        );

        loop {
            let sleep_for = match self.run_iteration().await {
                Ok(()) => self.poll_interval,
                Err(err) => {
                    error!(error = %err, "[ERROR] scheduling pass failed");
                    self.error_backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One scheduling pass: place pending pods, then re-evaluate the
    /// active strategy.
    pub async fn run_iteration(&mut self) -> Result<(), OrchestratorError> {
        let pending = self.orchestrator.list_pending_pods().await?;
        if !pending.is_empty() {
            info!(count = pending.len(), "pending taskmanagers found");
            for pod in &pending {
                self.schedule_pod(pod).await?;
            }
        }

        if self.fixed.is_none() {
            let cluster_cpu = self.metrics.cluster_cpu_percent().await;
            if let Some(switch) = self.selector.evaluate(cluster_cpu, Instant::now()) {
                info!(
                    from = %switch.from,
                    to = %switch.to,
                    cluster_cpu_percent = cluster_cpu,
                    estimated = !self.metrics.metrics_available(),
                    "[STRATEGY SWITCH]"
                );
                self.switches.push(switch);
            }
        }
        Ok(())
    }

    /// Place one pod. Binding failures never abort the pass; the pod stays
    /// pending on the API server and is rediscovered next time.
    async fn schedule_pod(&mut self, pod: &PodRecord) -> Result<(), OrchestratorError> {
        let candidates: Vec<NodeRecord> = self
            .orchestrator
            .list_nodes()
            .await?
            .into_iter()
            .filter(NodeRecord::schedulable)
            .collect();

        if candidates.is_empty() {
            warn!(pod = %pod.name, "no schedulable nodes");
            return Ok(());
        }

        let snapshot = self.snapshot_for(&candidates).await;
        let strategy = self.active_strategy();
        let Some(chosen) = self
            .strategies
            .select(strategy, &candidates, pod, &snapshot)
        else {
            warn!(pod = %pod.name, %strategy, "no suitable node");
            return Ok(());
        };
        let node = chosen.name.clone();
        let node_cpu = snapshot.cpu_percent(&node);

        match self.orchestrator.bind(pod, &node).await {
            Ok(()) => {
                let total = self.bound_total.fetch_add(1, Ordering::Relaxed) + 1;
                info!(
                    pod = %pod.name,
                    %strategy,
                    %node,
                    node_cpu_percent = node_cpu,
                    estimated = !snapshot.metrics_available,
                    total_bound = total,
                    "[SCHEDULING] pod bound"
                );
                self.log.record(PlacementDecision {
                    pod: pod.name.clone(),
                    node,
                    strategy,
                    node_cpu_percent: node_cpu,
                    at_epoch_ms: epoch_millis(),
                });
            }
            // Another actor placed the pod first; nothing to do.
            Err(BindError::Conflict) => {
                debug!(pod = %pod.name, %node, "binding conflict, pod already claimed");
            }
            Err(BindError::Forbidden(status)) => {
                error!(pod = %pod.name, %node, %status, "[ERROR] binding forbidden");
            }
            Err(BindError::Transient(cause)) => {
                error!(pod = %pod.name, %node, %cause, "[ERROR] binding failed");
            }
        }
        Ok(())
    }

    /// Observe CPU for every candidate; served from the metrics cache
    /// within its TTL.
    async fn snapshot_for(&self, candidates: &[NodeRecord]) -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot::new(self.metrics.metrics_available());
        for candidate in candidates {
            let cpu = self.metrics.node_cpu_percent(&candidate.name).await;
            snapshot.insert(candidate.name.clone(), cpu);
        }
        snapshot
    }

    // ── Introspection ──────────────────────────────────────────────

    pub fn decisions(&self) -> Vec<PlacementDecision> {
        self.log.snapshot()
    }

    pub fn switch_events(&self) -> &[StrategySwitch] {
        &self.switches
    }

    pub fn bound_total(&self) -> u64 {
        self.bound_total.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// The shutdown statistics block.
    pub fn render_statistics(&self) -> String {
        let report = SchedulingReport::from_decisions(&self.log.snapshot());
        report.render(
            self.active_strategy(),
            self.fixed,
            self.metrics.metrics_available(),
            self.switches.len(),
            self.strategies.bandit(),
        )
    }
}
