//! UCB1 multi-armed bandit over candidate nodes.
//!
//! Every node is an arm. Selection balances exploitation (average reward so
//! far) against exploration (uncertainty from a low selection count):
//!
//! ```text
//! UCB(a) = R(a)/n(a) + √2 · √(ln(N + 1) / n(a))
//! ```
//!
//! Before the ranking applies, every arm is selected at least twice
//! (deterministically, lowest input index first), so no node is starved of
//! its initial observations. The reward favors moderate CPU: saturation is
//! penalized hard, idle nodes get partial credit so exploration of them is
//! not suppressed.

use std::collections::BTreeMap;
use taskgrid_core::{epoch_millis, MetricsSnapshot, NodeRecord};
use tracing::debug;

/// UCB1 exploration weight.
const EXPLORATION_WEIGHT: f64 = std::f64::consts::SQRT_2;

/// Selections every arm must receive before UCB1 ranking applies.
const EXPLORATION_FLOOR: u64 = 2;

/// CPU band considered optimally utilized.
const OPTIMAL_CPU_LOW: f64 = 30.0;
const OPTIMAL_CPU_HIGH: f64 = 70.0;

/// Running statistics for one arm (node).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArmStats {
    /// Times this arm was selected.
    pub selections: u64,
    /// Sum of rewards over all selections.
    pub total_reward: f64,
    /// Unix milliseconds of the most recent selection.
    pub last_selected_ms: Option<u64>,
}

impl ArmStats {
    /// Mean reward; 0 before the first selection.
    pub fn average_reward(&self) -> f64 {
        if self.selections > 0 {
            self.total_reward / self.selections as f64
        } else {
            0.0
        }
    }
}

/// The bandit state: one arm per node ever offered as a candidate.
pub struct Bandit {
    arms: BTreeMap<String, ArmStats>,
    total_selections: u64,
}

impl Bandit {
    pub fn new() -> Self {
        Self {
            arms: BTreeMap::new(),
            total_selections: 0,
        }
    }

    /// Pick a candidate and immediately book the reward for the choice,
    /// drawn from the CPU observed in the snapshot.
    pub fn select<'a>(
        &mut self,
        candidates: &'a [NodeRecord],
        metrics: &MetricsSnapshot,
    ) -> Option<&'a NodeRecord> {
        if candidates.is_empty() {
            return None;
        }

        // New nodes enter the arm table with zeroed stats.
        for candidate in candidates {
            self.arms.entry(candidate.name.clone()).or_default();
        }

        // Exploration floor: lowest input index among under-explored arms.
        let chosen = candidates
            .iter()
            .find(|c| self.arms[&c.name].selections < EXPLORATION_FLOOR)
            .map(|c| {
                debug!(node = %c.name, "bandit exploration floor selection");
                c
            })
            .unwrap_or_else(|| self.ucb_best(candidates));

        self.record(&chosen.name, metrics.cpu_percent(&chosen.name));
        Some(chosen)
    }

    /// Arm with the maximum UCB value; ties keep the earlier candidate.
    fn ucb_best<'a>(&self, candidates: &'a [NodeRecord]) -> &'a NodeRecord {
        let mut best = &candidates[0];
        let mut best_value = f64::NEG_INFINITY;
        for candidate in candidates {
            let value = self.ucb_value(&self.arms[&candidate.name]);
            if value > best_value {
                best_value = value;
                best = candidate;
            }
        }
        debug!(node = %best.name, ucb = best_value, "bandit ucb1 selection");
        best
    }

    /// `R/n + √2·√(ln(N+1)/n)`. Only called once every arm cleared the
    /// exploration floor, so `n > 0` holds.
    fn ucb_value(&self, stats: &ArmStats) -> f64 {
        let exploitation = stats.average_reward();
        let exploration = EXPLORATION_WEIGHT
            * (((self.total_selections + 1) as f64).ln() / stats.selections as f64).sqrt();
        exploitation + exploration
    }

    fn record(&mut self, node: &str, cpu_percent: f64) {
        let reward = reward_for_cpu(cpu_percent);
        self.total_selections += 1;
        let stats = self.arms.entry(node.to_string()).or_default();
        stats.selections += 1;
        stats.total_reward += reward;
        stats.last_selected_ms = Some(epoch_millis());
        debug!(
            node,
            cpu_percent,
            reward,
            selections = stats.selections,
            total = self.total_selections,
            "bandit reward booked"
        );
    }

    /// Per-arm statistics in stable (name) order.
    pub fn arms(&self) -> &BTreeMap<String, ArmStats> {
        &self.arms
    }

    pub fn total_selections(&self) -> u64 {
        self.total_selections
    }

    /// Whether this bandit has ever selected an arm.
    pub fn is_active(&self) -> bool {
        self.total_selections > 0
    }
}

impl Default for Bandit {
    fn default() -> Self {
        Self::new()
    }
}

/// Reward for placing onto a node at the given CPU, clamped to `[0, 1]`.
///
/// - `[30, 70]` → 1.0 (moderate utilization)
/// - `< 30` → `0.5 + (cpu/30)·0.3` (partial credit for idle capacity)
/// - `(70, 90]` → `1.0 − ((cpu−70)/20)·0.5` (decreasing)
/// - `> 90` → 0.2 (saturated)
pub fn reward_for_cpu(cpu_percent: f64) -> f64 {
    let reward = if (OPTIMAL_CPU_LOW..=OPTIMAL_CPU_HIGH).contains(&cpu_percent) {
        1.0
    } else if cpu_percent < OPTIMAL_CPU_LOW {
        0.5 + (cpu_percent / OPTIMAL_CPU_LOW) * 0.3
    } else if cpu_percent <= 90.0 {
        1.0 - ((cpu_percent - OPTIMAL_CPU_HIGH) / (90.0 - OPTIMAL_CPU_HIGH)) * 0.5
    } else {
        0.2
    };
    reward.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            ready: true,
            taints: Vec::new(),
            allocatable_millis: 4000.0,
        }
    }

    fn snapshot(entries: &[(&str, f64)]) -> MetricsSnapshot {
        let mut snap = MetricsSnapshot::new(true);
        for (name, cpu) in entries {
            snap.insert(*name, *cpu);
        }
        snap
    }

    #[test]
    fn exploration_floor_visits_each_arm_twice() {
        let mut bandit = Bandit::new();
        let candidates = vec![node("a"), node("b"), node("c")];
        let snap = snapshot(&[("a", 50.0), ("b", 50.0), ("c", 50.0)]);

        let picks: Vec<String> = (0..6)
            .map(|_| bandit.select(&candidates, &snap).unwrap().name.clone())
            .collect();
        assert_eq!(picks, vec!["a", "a", "b", "b", "c", "c"]);
        assert_eq!(bandit.total_selections(), 6);
    }

    #[test]
    fn reward_profile_matches_contract() {
        assert_eq!(reward_for_cpu(50.0), 1.0);
        assert_eq!(reward_for_cpu(30.0), 1.0);
        assert_eq!(reward_for_cpu(70.0), 1.0);
        assert!((reward_for_cpu(20.0) - 0.70).abs() < 1e-9);
        assert!((reward_for_cpu(80.0) - 0.75).abs() < 1e-9);
        assert_eq!(reward_for_cpu(95.0), 0.2);
        assert!((reward_for_cpu(0.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reward_stays_in_unit_interval() {
        for cpu in [-10.0, 0.0, 15.0, 29.999, 45.0, 70.001, 89.9, 90.0, 100.0, 250.0] {
            let r = reward_for_cpu(cpu);
            assert!((0.0..=1.0).contains(&r), "reward {r} for cpu {cpu}");
        }
    }

    #[test]
    fn ucb_prefers_the_better_performing_arm() {
        let mut bandit = Bandit::new();
        let candidates = vec![node("good"), node("bad")];
        // "good" sits in the optimal band, "bad" is saturated.
        let snap = snapshot(&[("good", 50.0), ("bad", 95.0)]);

        // Clear the exploration floor.
        for _ in 0..4 {
            bandit.select(&candidates, &snap);
        }
        // With equal counts, the higher average reward must win.
        let pick = bandit.select(&candidates, &snap).unwrap();
        assert_eq!(pick.name, "good");
    }

    #[test]
    fn identical_observations_yield_identical_selection_sequences() {
        let candidates = vec![node("a"), node("b"), node("c")];
        let observations = [
            snapshot(&[("a", 10.0), ("b", 55.0), ("c", 92.0)]),
            snapshot(&[("a", 20.0), ("b", 60.0), ("c", 88.0)]),
            snapshot(&[("a", 35.0), ("b", 65.0), ("c", 91.0)]),
        ];

        let run = |bandit: &mut Bandit| -> Vec<String> {
            (0..12)
                .map(|i| {
                    let snap = &observations[i % observations.len()];
                    bandit.select(&candidates, snap).unwrap().name.clone()
                })
                .collect()
        };

        let first = run(&mut Bandit::new());
        let second = run(&mut Bandit::new());
        assert_eq!(first, second);
    }

    #[test]
    fn each_selection_books_a_bounded_reward() {
        let mut bandit = Bandit::new();
        let candidates = vec![node("a"), node("b")];
        let snap = snapshot(&[("a", 44.0), ("b", 97.0)]);

        for _ in 0..10 {
            let before: BTreeMap<String, ArmStats> = bandit.arms().clone();
            let chosen = bandit.select(&candidates, &snap).unwrap().name.clone();
            let after = &bandit.arms()[&chosen];
            let prior = before.get(&chosen).cloned().unwrap_or_default();
            assert_eq!(after.selections, prior.selections + 1);
            let delta = after.total_reward - prior.total_reward;
            assert!((0.0..=1.0).contains(&delta), "reward delta {delta}");
        }
    }

    #[test]
    fn late_arriving_node_starts_from_zero() {
        let mut bandit = Bandit::new();
        let two = vec![node("a"), node("b")];
        let snap = snapshot(&[("a", 50.0), ("b", 50.0), ("late", 50.0)]);
        for _ in 0..4 {
            bandit.select(&two, &snap);
        }

        // A new candidate appears; the exploration floor sends traffic there.
        let three = vec![node("a"), node("b"), node("late")];
        let pick = bandit.select(&three, &snap).unwrap();
        assert_eq!(pick.name, "late");
        assert_eq!(bandit.arms()["late"].selections, 1);
    }

    #[test]
    fn empty_candidates_select_nothing() {
        let mut bandit = Bandit::new();
        assert!(bandit.select(&[], &MetricsSnapshot::new(true)).is_none());
        assert_eq!(bandit.total_selections(), 0);
    }
}
