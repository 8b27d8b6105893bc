//! Trait seams between the control loop and the live cluster.

use crate::error::{BindError, OrchestratorError};
use crate::types::{NodeRecord, PodRecord};
use async_trait::async_trait;

/// Capability surface of the cluster orchestrator.
///
/// The production implementation talks to the Kubernetes API; scenario tests
/// substitute in-memory fakes so the control loop runs without a cluster.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// All nodes currently known to the cluster, ready or not.
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, OrchestratorError>;

    /// Pods claimed by this scheduler that have no target node yet.
    async fn list_pending_pods(&self) -> Result<Vec<PodRecord>, OrchestratorError>;

    /// Commit a pod→node placement.
    async fn bind(&self, pod: &PodRecord, node: &str) -> Result<(), BindError>;
}

/// Per-node CPU readings feeding placement decisions.
///
/// Implementations may serve cached values; callers must assume a value can
/// be up to one TTL window old.
#[async_trait]
pub trait CpuSource: Send + Sync {
    /// CPU usage for one node as a percentage of its allocatable CPU,
    /// in `[0, 100]`.
    async fn node_cpu_percent(&self, node: &str) -> f64;

    /// Arithmetic mean of per-node CPU across all observed nodes;
    /// 50 when no nodes are known.
    async fn cluster_cpu_percent(&self) -> f64;

    /// False once the metrics subsystem has been found unavailable and the
    /// source has latched into estimator mode.
    fn metrics_available(&self) -> bool;
}
