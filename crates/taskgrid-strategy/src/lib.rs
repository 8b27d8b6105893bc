//! taskgrid-strategy — placement strategies for pending TaskManager pods.
//!
//! Every strategy is a rule from `(candidates, pod, metrics snapshot)` to one
//! candidate. Strategies are dispatched as tagged variants from a
//! [`StrategySet`] rather than trait objects; the only strategies with state
//! of their own are BALANCED (an atomic round-robin counter) and BANDIT (the
//! UCB1 arm table), and both own that state inside the set.
//!
//! Tie-breaking is always input order, which keeps every strategy
//! deterministic for a given observation sequence.

pub mod bandit;
pub mod round_robin;
pub mod selector;

pub use bandit::{reward_for_cpu, ArmStats, Bandit};
pub use round_robin::RoundRobinCounter;
pub use selector::AdaptiveSelector;

use taskgrid_core::{MetricsSnapshot, NodeRecord, PodRecord, Strategy};

/// Pods with a `priority` label at or above this delegate to LEAST_LOADED.
const HIGH_PRIORITY_FLOOR: i64 = 5;

/// The strategy implementations, owned by the scheduling loop.
pub struct StrategySet {
    round_robin: RoundRobinCounter,
    bandit: Bandit,
}

impl StrategySet {
    pub fn new() -> Self {
        Self {
            round_robin: RoundRobinCounter::new(),
            bandit: Bandit::new(),
        }
    }

    /// Run one strategy over a candidate list.
    ///
    /// Returns `None` only when `candidates` is empty. Side effects (the
    /// round-robin counter, bandit arm statistics) are applied in call
    /// order.
    pub fn select<'a>(
        &mut self,
        strategy: Strategy,
        candidates: &'a [NodeRecord],
        pod: &PodRecord,
        metrics: &MetricsSnapshot,
    ) -> Option<&'a NodeRecord> {
        if candidates.is_empty() {
            return None;
        }
        match strategy {
            Strategy::Fcfs => candidates.first(),
            Strategy::Balanced => {
                let index = self.round_robin.next(candidates.len())?;
                candidates.get(index)
            }
            Strategy::LeastLoaded => least_loaded(candidates, metrics),
            Strategy::Priority => {
                if pod.priority() >= HIGH_PRIORITY_FLOOR {
                    least_loaded(candidates, metrics)
                } else {
                    candidates.first()
                }
            }
            Strategy::Bandit => self.bandit.select(candidates, metrics),
        }
    }

    pub fn bandit(&self) -> &Bandit {
        &self.bandit
    }
}

impl Default for StrategySet {
    fn default() -> Self {
        Self::new()
    }
}

/// Candidate with the lowest observed CPU; earlier candidates win ties.
fn least_loaded<'a>(
    candidates: &'a [NodeRecord],
    metrics: &MetricsSnapshot,
) -> Option<&'a NodeRecord> {
    let mut best: Option<(&NodeRecord, f64)> = None;
    for candidate in candidates {
        let cpu = metrics.cpu_percent(&candidate.name);
        match best {
            Some((_, best_cpu)) if cpu >= best_cpu => {}
            _ => best = Some((candidate, cpu)),
        }
    }
    best.map(|(node, _)| node)
}
