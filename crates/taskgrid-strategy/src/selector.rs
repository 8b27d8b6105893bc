//! Adaptive strategy selection.
//!
//! Once per scheduling pass the selector maps the cluster-average CPU onto a
//! strategy tier and, if the tier changed and the cooldown has elapsed,
//! commits the switch. The cooldown keeps the scheduler from flapping
//! between strategies while the cluster hovers around a threshold.

use std::time::{Duration, Instant};
use taskgrid_core::{epoch_millis, Cascade, Config, Strategy, StrategySwitch};

/// Cooldown-gated mapping from cluster CPU to the active strategy.
pub struct AdaptiveSelector {
    active: Strategy,
    last_switch: Instant,
    cascade: Cascade,
    low_threshold: f64,
    high_threshold: f64,
    cooldown: Duration,
}

impl AdaptiveSelector {
    /// Start with FCFS active and the cooldown window open from `now`.
    pub fn new(
        cascade: Cascade,
        low_threshold: f64,
        high_threshold: f64,
        cooldown: Duration,
        now: Instant,
    ) -> Self {
        Self {
            active: Strategy::Fcfs,
            last_switch: now,
            cascade,
            low_threshold,
            high_threshold,
            cooldown,
        }
    }

    pub fn from_config(config: &Config, now: Instant) -> Self {
        Self::new(
            config.cascade,
            config.cpu_low_threshold,
            config.cpu_high_threshold,
            config.cooldown,
            now,
        )
    }

    pub fn active(&self) -> Strategy {
        self.active
    }

    /// The strategy this cascade prescribes for a cluster CPU reading.
    pub fn target_for(&self, cluster_cpu: f64) -> Strategy {
        match self.cascade {
            Cascade::Balanced => {
                if cluster_cpu > self.high_threshold {
                    Strategy::LeastLoaded
                } else if cluster_cpu > self.low_threshold {
                    Strategy::Balanced
                } else {
                    Strategy::Fcfs
                }
            }
            Cascade::Bandit => {
                if cluster_cpu > self.high_threshold {
                    Strategy::Bandit
                } else if cluster_cpu > self.low_threshold {
                    Strategy::LeastLoaded
                } else {
                    Strategy::Fcfs
                }
            }
        }
    }

    /// Evaluate one pass. Returns the committed switch, if any.
    ///
    /// `now` is injected by the caller so the cooldown gate is testable.
    pub fn evaluate(&mut self, cluster_cpu: f64, now: Instant) -> Option<StrategySwitch> {
        if now.duration_since(self.last_switch) < self.cooldown {
            return None;
        }

        let target = self.target_for(cluster_cpu);
        if target == self.active {
            return None;
        }

        let event = StrategySwitch {
            from: self.active,
            to: target,
            cluster_cpu_percent: cluster_cpu,
            at_epoch_ms: epoch_millis(),
        };
        self.active = target;
        self.last_switch = now;
        Some(event)
    }
}
