//! Domain types shared across the taskgrid crates.
//!
//! These are deliberately decoupled from the Kubernetes API objects: the
//! orchestrator client converts `Node`/`Pod` into these records once, and
//! everything downstream (strategies, the control loop, the decision log)
//! works on plain data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// CPU percentage assumed for a node the metrics source knows nothing about.
pub const UNKNOWN_CPU_PERCENT: f64 = 50.0;

/// Taint effects that exclude a node from scheduling.
const BLOCKING_TAINT_EFFECTS: [&str; 2] = ["NoSchedule", "NoExecute"];

// ── Nodes and pods ─────────────────────────────────────────────────

/// A cluster node as seen by the scheduler.
///
/// Immutable within a loop iteration; rebuilt from the API on every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    /// Whether the node reported a `Ready=True` condition.
    pub ready: bool,
    /// Taint effects present on the node (e.g. `NoSchedule`).
    pub taints: Vec<String>,
    /// Allocatable CPU in millicores.
    pub allocatable_millis: f64,
}

impl NodeRecord {
    /// A node is a placement candidate iff it is ready and carries no
    /// `NoSchedule` or `NoExecute` taint.
    pub fn schedulable(&self) -> bool {
        self.ready
            && !self
                .taints
                .iter()
                .any(|effect| BLOCKING_TAINT_EFFECTS.contains(&effect.as_str()))
    }
}

/// A pending pod claimed by this scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

impl PodRecord {
    /// Scheduling priority from the `priority` label.
    ///
    /// Defaults to 1 when the label is absent or not an integer.
    pub fn priority(&self) -> i64 {
        self.labels
            .get("priority")
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(1)
    }
}

// ── Strategies ─────────────────────────────────────────────────────

/// The placement strategies the scheduler can run.
///
/// Display and `FromStr` use the operator-facing names that appear in
/// `FIXED_STRATEGY`, log lines, and the shutdown statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// First come, first served: always the first candidate.
    Fcfs,
    /// Round-robin across candidates.
    Balanced,
    /// The candidate with the lowest observed CPU.
    LeastLoaded,
    /// High-priority pods go to the least-loaded node, the rest FCFS.
    Priority,
    /// UCB1 multi-armed bandit over candidate nodes.
    Bandit,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Fcfs,
        Strategy::Balanced,
        Strategy::LeastLoaded,
        Strategy::Priority,
        Strategy::Bandit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Fcfs => "FCFS",
            Strategy::Balanced => "BALANCED",
            Strategy::LeastLoaded => "LEAST_LOADED",
            Strategy::Priority => "PRIORITY",
            Strategy::Bandit => "BANDIT",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FCFS" => Ok(Strategy::Fcfs),
            "BALANCED" => Ok(Strategy::Balanced),
            "LEAST_LOADED" => Ok(Strategy::LeastLoaded),
            "PRIORITY" => Ok(Strategy::Priority),
            "BANDIT" => Ok(Strategy::Bandit),
            other => Err(format!("unknown strategy: {other:?}")),
        }
    }
}

// ── Metrics snapshot ───────────────────────────────────────────────

/// Per-node CPU observed for one scheduling decision.
///
/// Built by the control loop from the metrics source after the candidate
/// list is assembled, and handed to the strategy as plain data so every
/// strategy stays a pure function of its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    cpu_percent: BTreeMap<String, f64>,
    /// False when the metrics subsystem is down and values are estimates.
    pub metrics_available: bool,
}

impl MetricsSnapshot {
    pub fn new(metrics_available: bool) -> Self {
        Self {
            cpu_percent: BTreeMap::new(),
            metrics_available,
        }
    }

    pub fn insert(&mut self, node: impl Into<String>, cpu_percent: f64) {
        self.cpu_percent.insert(node.into(), cpu_percent);
    }

    /// Observed CPU for a node, or [`UNKNOWN_CPU_PERCENT`] when unobserved.
    pub fn cpu_percent(&self, node: &str) -> f64 {
        self.cpu_percent
            .get(node)
            .copied()
            .unwrap_or(UNKNOWN_CPU_PERCENT)
    }

    pub fn len(&self) -> usize {
        self.cpu_percent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cpu_percent.is_empty()
    }
}

// ── Records ────────────────────────────────────────────────────────

/// A committed pod→node placement.
///
/// Recorded only after the API server confirmed the binding; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementDecision {
    pub pod: String,
    pub node: String,
    pub strategy: Strategy,
    /// Node CPU observed when the decision was made.
    pub node_cpu_percent: f64,
    /// Unix timestamp in milliseconds.
    pub at_epoch_ms: u64,
}

/// A committed change of the active strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySwitch {
    pub from: Strategy,
    pub to: Strategy,
    /// Cluster-average CPU that triggered the switch.
    pub cluster_cpu_percent: f64,
    /// Unix timestamp in milliseconds.
    pub at_epoch_ms: u64,
}

/// Current Unix epoch in milliseconds.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, ready: bool, taints: &[&str]) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            ready,
            taints: taints.iter().map(|t| t.to_string()).collect(),
            allocatable_millis: 4000.0,
        }
    }

    #[test]
    fn ready_untainted_node_is_schedulable() {
        assert!(node("n1", true, &[]).schedulable());
        assert!(node("n1", true, &["PreferNoSchedule"]).schedulable());
    }

    #[test]
    fn not_ready_or_tainted_node_is_excluded() {
        assert!(!node("n1", false, &[]).schedulable());
        assert!(!node("n1", true, &["NoSchedule"]).schedulable());
        assert!(!node("n1", true, &["NoExecute"]).schedulable());
    }

    #[test]
    fn pod_priority_defaults_to_one() {
        let mut pod = PodRecord {
            name: "tm-1".to_string(),
            namespace: "default".to_string(),
            labels: BTreeMap::new(),
        };
        assert_eq!(pod.priority(), 1);

        pod.labels
            .insert("priority".to_string(), "not-a-number".to_string());
        assert_eq!(pod.priority(), 1);

        pod.labels.insert("priority".to_string(), "7".to_string());
        assert_eq!(pod.priority(), 7);
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.as_str().parse::<Strategy>(), Ok(strategy));
        }
        assert_eq!("least_loaded".parse::<Strategy>(), Ok(Strategy::LeastLoaded));
        assert!("FIFO".parse::<Strategy>().is_err());
    }

    #[test]
    fn snapshot_defaults_unobserved_nodes() {
        let mut snap = MetricsSnapshot::new(true);
        snap.insert("n1", 12.5);
        assert_eq!(snap.cpu_percent("n1"), 12.5);
        assert_eq!(snap.cpu_percent("n2"), UNKNOWN_CPU_PERCENT);
    }
}
