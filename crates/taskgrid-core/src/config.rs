//! Environment-driven scheduler configuration.
//!
//! All knobs come from environment variables with defaults matching the
//! deployed manifests. Malformed values never abort startup; they log a
//! warning and fall back to the default.

use crate::types::Strategy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Which strategy cascade the adaptive selector runs.
///
/// The selector maps cluster CPU to a strategy tier; the two cascades differ
/// in the middle and top tiers and in their default thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    /// FCFS → BALANCED → LEAST_LOADED, default thresholds 40 / 80.
    Balanced,
    /// FCFS → LEAST_LOADED → BANDIT, default thresholds 30 / 60.
    Bandit,
}

impl Cascade {
    /// Default (low, high) thresholds for this cascade, in percent.
    pub fn default_thresholds(&self) -> (f64, f64) {
        match self {
            Cascade::Balanced => (40.0, 80.0),
            Cascade::Bandit => (30.0, 60.0),
        }
    }
}

impl fmt::Display for Cascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cascade::Balanced => f.write_str("BALANCED"),
            Cascade::Bandit => f.write_str("BANDIT"),
        }
    }
}

impl FromStr for Cascade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BALANCED" => Ok(Cascade::Balanced),
            "BANDIT" => Ok(Cascade::Bandit),
            other => Err(format!("unknown cascade: {other:?}")),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Lower boundary of the adaptive cascade, percent.
    pub cpu_low_threshold: f64,
    /// Upper boundary of the adaptive cascade, percent.
    pub cpu_high_threshold: f64,
    /// Minimum interval between strategy switches.
    pub cooldown: Duration,
    /// Pin one strategy and disable the adaptive selector.
    pub fixed_strategy: Option<Strategy>,
    /// Which cascade the adaptive selector runs.
    pub cascade: Cascade,
    /// Sleep between scheduling passes.
    pub poll_interval: Duration,
    /// Sleep after a failed scheduling pass.
    pub error_backoff: Duration,
    /// How long a cached per-node CPU sample stays fresh.
    pub metrics_cache_ttl: Duration,
    /// Bound on every orchestrator and metrics request.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let cascade = Cascade::Balanced;
        let (lo, hi) = cascade.default_thresholds();
        Self {
            cpu_low_threshold: lo,
            cpu_high_threshold: hi,
            cooldown: Duration::from_secs(30),
            fixed_strategy: None,
            cascade,
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            metrics_cache_ttl: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// The seam exists so the parsing rules are testable without mutating
    /// process-wide environment state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cascade = parse_var(&lookup, "STRATEGY_CASCADE", Cascade::Balanced);
        let (default_lo, default_hi) = cascade.default_thresholds();

        let fixed_strategy = lookup("FIXED_STRATEGY")
            .filter(|raw| !raw.trim().is_empty())
            .and_then(|raw| match raw.parse::<Strategy>() {
                Ok(strategy) => Some(strategy),
                Err(err) => {
                    warn!(value = %raw, %err, "ignoring invalid FIXED_STRATEGY");
                    None
                }
            });

        Self {
            cpu_low_threshold: parse_var(&lookup, "CPU_LOW_THRESHOLD", default_lo),
            cpu_high_threshold: parse_var(&lookup, "CPU_HIGH_THRESHOLD", default_hi),
            cooldown: secs_var(&lookup, "STRATEGY_COOLDOWN", 30),
            fixed_strategy,
            cascade,
            poll_interval: secs_var(&lookup, "POLL_INTERVAL", 2),
            error_backoff: secs_var(&lookup, "ERROR_BACKOFF", 5),
            metrics_cache_ttl: secs_var(&lookup, "METRICS_CACHE_TTL", 5),
            request_timeout: secs_var(&lookup, "REQUEST_TIMEOUT", 5),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(err) => {
                warn!(var = key, value = %raw, %err, "ignoring invalid configuration value");
                default
            }
        },
    }
}

fn secs_var(lookup: &impl Fn(&str) -> Option<String>, key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(parse_var(lookup, key, default_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_deployment_contract() {
        let config = config_from(&[]);
        assert_eq!(config.cpu_low_threshold, 40.0);
        assert_eq!(config.cpu_high_threshold, 80.0);
        assert_eq!(config.cooldown, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.error_backoff, Duration::from_secs(5));
        assert_eq!(config.metrics_cache_ttl, Duration::from_secs(5));
        assert_eq!(config.fixed_strategy, None);
        assert_eq!(config.cascade, Cascade::Balanced);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn thresholds_and_cooldown_are_overridable() {
        let config = config_from(&[
            ("CPU_LOW_THRESHOLD", "25.5"),
            ("CPU_HIGH_THRESHOLD", "70"),
            ("STRATEGY_COOLDOWN", "60"),
        ]);
        assert_eq!(config.cpu_low_threshold, 25.5);
        assert_eq!(config.cpu_high_threshold, 70.0);
        assert_eq!(config.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn bandit_cascade_shifts_default_thresholds() {
        let config = config_from(&[("STRATEGY_CASCADE", "bandit")]);
        assert_eq!(config.cascade, Cascade::Bandit);
        assert_eq!(config.cpu_low_threshold, 30.0);
        assert_eq!(config.cpu_high_threshold, 60.0);

        // Explicit thresholds still win over the cascade defaults.
        let config = config_from(&[
            ("STRATEGY_CASCADE", "BANDIT"),
            ("CPU_HIGH_THRESHOLD", "75"),
        ]);
        assert_eq!(config.cpu_low_threshold, 30.0);
        assert_eq!(config.cpu_high_threshold, 75.0);
    }

    #[test]
    fn fixed_strategy_parses_operator_names() {
        let config = config_from(&[("FIXED_STRATEGY", "LEAST_LOADED")]);
        assert_eq!(config.fixed_strategy, Some(Strategy::LeastLoaded));

        let config = config_from(&[("FIXED_STRATEGY", "bandit")]);
        assert_eq!(config.fixed_strategy, Some(Strategy::Bandit));
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("CPU_LOW_THRESHOLD", "forty"),
            ("STRATEGY_COOLDOWN", "-3"),
            ("FIXED_STRATEGY", "SHORTEST_JOB_FIRST"),
            ("STRATEGY_CASCADE", "ternary"),
        ]);
        assert_eq!(config, Config::default());
    }

    #[test]
    fn empty_fixed_strategy_means_adaptive() {
        let config = config_from(&[("FIXED_STRATEGY", "")]);
        assert_eq!(config.fixed_strategy, None);
    }
}
