//! Placement history and shutdown statistics.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::RwLock;
use taskgrid_core::{PlacementDecision, Strategy};
use taskgrid_strategy::Bandit;

/// Append-only log of committed placements.
///
/// The control loop is the only writer; readers (the shutdown statistics)
/// take a consistent snapshot.
pub struct DecisionLog {
    entries: RwLock<Vec<PlacementDecision>>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn record(&self, decision: PlacementDecision) {
        self.entries
            .write()
            .expect("decision log poisoned")
            .push(decision);
    }

    pub fn snapshot(&self) -> Vec<PlacementDecision> {
        self.entries
            .read()
            .expect("decision log poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("decision log poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DecisionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregated view of the decision log.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingReport {
    pub total: usize,
    pub by_strategy: BTreeMap<Strategy, usize>,
    pub by_node: BTreeMap<String, usize>,
}

impl SchedulingReport {
    pub fn from_decisions(decisions: &[PlacementDecision]) -> Self {
        let mut by_strategy = BTreeMap::new();
        let mut by_node = BTreeMap::new();
        for decision in decisions {
            *by_strategy.entry(decision.strategy).or_insert(0) += 1;
            *by_node.entry(decision.node.clone()).or_insert(0) += 1;
        }
        Self {
            total: decisions.len(),
            by_strategy,
            by_node,
        }
    }

    /// Share of decisions made under one strategy, in percent.
    pub fn strategy_percent(&self, strategy: Strategy) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let count = self.by_strategy.get(&strategy).copied().unwrap_or(0);
        count as f64 * 100.0 / self.total as f64
    }

    /// Human-readable statistics block for shutdown.
    pub fn render(
        &self,
        active: Strategy,
        fixed: Option<Strategy>,
        metrics_available: bool,
        switches: usize,
        bandit: &Bandit,
    ) -> String {
        let mut out = String::new();
        let rule = "========================================";
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "     SCHEDULING STATISTICS");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Total pods scheduled: {}", self.total);
        match fixed {
            Some(strategy) => {
                let _ = writeln!(out, "Mode: FIXED ({strategy})");
            }
            None => {
                let _ = writeln!(out, "Mode: ADAPTIVE (active: {active})");
                let _ = writeln!(out, "Strategy switches: {switches}");
            }
        }
        let _ = writeln!(
            out,
            "Metrics source: {}",
            if metrics_available {
                "metrics server"
            } else {
                "pod-count estimate"
            }
        );

        if !self.by_strategy.is_empty() {
            let _ = writeln!(out, "\nDistribution by strategy:");
            for (strategy, count) in &self.by_strategy {
                let _ = writeln!(
                    out,
                    "  {strategy}: {count} ({:.1}%)",
                    self.strategy_percent(*strategy)
                );
            }
        }

        if !self.by_node.is_empty() {
            let _ = writeln!(out, "\nPlacements by node:");
            for (node, count) in &self.by_node {
                let _ = writeln!(out, "  {node}: {count}");
            }
        }

        if bandit.is_active() {
            let _ = writeln!(
                out,
                "\nBandit arms ({} selections):",
                bandit.total_selections()
            );
            for (node, stats) in bandit.arms() {
                let _ = writeln!(
                    out,
                    "  {node}: n={} R={:.4} avg={:.4}",
                    stats.selections,
                    stats.total_reward,
                    stats.average_reward()
                );
            }
        }

        let _ = writeln!(out, "{rule}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskgrid_core::epoch_millis;

    fn decision(pod: &str, node: &str, strategy: Strategy) -> PlacementDecision {
        PlacementDecision {
            pod: pod.to_string(),
            node: node.to_string(),
            strategy,
            node_cpu_percent: 42.0,
            at_epoch_ms: epoch_millis(),
        }
    }

    #[test]
    fn log_appends_and_snapshots() {
        let log = DecisionLog::new();
        assert!(log.is_empty());

        log.record(decision("tm-0", "a", Strategy::Fcfs));
        log.record(decision("tm-1", "b", Strategy::Fcfs));

        let snap = log.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].pod, "tm-0");
        assert_eq!(snap[1].node, "b");

        // The snapshot is detached from later appends.
        log.record(decision("tm-2", "a", Strategy::Balanced));
        assert_eq!(snap.len(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn report_groups_by_strategy_and_node() {
        let decisions = vec![
            decision("tm-0", "a", Strategy::Fcfs),
            decision("tm-1", "a", Strategy::Fcfs),
            decision("tm-2", "b", Strategy::LeastLoaded),
            decision("tm-3", "c", Strategy::Fcfs),
        ];
        let report = SchedulingReport::from_decisions(&decisions);

        assert_eq!(report.total, 4);
        assert_eq!(report.by_strategy[&Strategy::Fcfs], 3);
        assert_eq!(report.by_strategy[&Strategy::LeastLoaded], 1);
        assert_eq!(report.by_node["a"], 2);
        assert_eq!(report.strategy_percent(Strategy::Fcfs), 75.0);
        assert_eq!(report.strategy_percent(Strategy::Bandit), 0.0);
    }

    #[test]
    fn empty_report_renders_without_percent_division() {
        let report = SchedulingReport::from_decisions(&[]);
        assert_eq!(report.strategy_percent(Strategy::Fcfs), 0.0);

        let rendered = report.render(Strategy::Fcfs, None, true, 0, &Bandit::new());
        assert!(rendered.contains("Total pods scheduled: 0"));
        assert!(rendered.contains("Mode: ADAPTIVE"));
        assert!(!rendered.contains("Bandit arms"));
    }

    #[test]
    fn fixed_mode_and_bandit_arms_show_in_render() {
        use taskgrid_core::{MetricsSnapshot, NodeRecord};

        let mut bandit = Bandit::new();
        let candidates = vec![NodeRecord {
            name: "a".to_string(),
            ready: true,
            taints: Vec::new(),
            allocatable_millis: 4000.0,
        }];
        let mut snap = MetricsSnapshot::new(true);
        snap.insert("a", 50.0);
        bandit.select(&candidates, &snap);

        let report =
            SchedulingReport::from_decisions(&[decision("tm-0", "a", Strategy::Bandit)]);
        let rendered = report.render(Strategy::Bandit, Some(Strategy::Bandit), false, 0, &bandit);
        assert!(rendered.contains("Mode: FIXED (BANDIT)"));
        assert!(rendered.contains("pod-count estimate"));
        assert!(rendered.contains("Bandit arms (1 selections):"));
        assert!(rendered.contains("a: n=1 R=1.0000 avg=1.0000"));
    }
}
