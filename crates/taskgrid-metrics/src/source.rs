//! Cached per-node CPU percentages with estimator fallback.

use crate::fetcher::UsageFetcher;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use taskgrid_core::{CpuSource, UNKNOWN_CPU_PERCENT};
use tracing::{debug, info, warn};

/// Estimator parameters: `clamp(BASE + PER_POD · pods, 0, CAP)`.
const ESTIMATE_BASE_PERCENT: f64 = 15.0;
const ESTIMATE_PER_POD_PERCENT: f64 = 8.0;
const ESTIMATE_CAP_PERCENT: f64 = 90.0;

struct CachedSample {
    cpu_percent: f64,
    taken: Instant,
}

/// Per-node CPU as a percentage of allocatable, served from a TTL cache.
///
/// While the metrics endpoint answers, readings are real usage over
/// allocatable, clamped to `[0, 100]`. The first failed listing latches the
/// source into estimator mode for the rest of the process; from then on CPU
/// is approximated from the number of pods on each node. A node missing
/// from an otherwise healthy listing is estimated individually without
/// latching.
pub struct NodeCpuSource<F> {
    fetcher: F,
    cache: DashMap<String, CachedSample>,
    ttl: Duration,
    available: AtomicBool,
}

impl<F: UsageFetcher> NodeCpuSource<F> {
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self {
            fetcher,
            cache: DashMap::new(),
            ttl,
            available: AtomicBool::new(true),
        }
    }

    /// Probe the metrics endpoint once at startup.
    ///
    /// Returns whether real metrics are being served.
    pub async fn probe(&self) -> bool {
        match self.fetcher.usage().await {
            Ok(usage) => {
                info!(nodes = usage.len(), "metrics endpoint available, using real node CPU");
                true
            }
            Err(err) => {
                self.latch_estimator(&err.to_string());
                false
            }
        }
    }

    /// CPU for one node, at most one TTL window old.
    pub async fn node_cpu_percent(&self, node: &str) -> f64 {
        if let Some(hit) = self.cached(node) {
            return hit;
        }

        if self.available.load(Ordering::Relaxed) {
            if let Some(percents) = self.refresh_all().await {
                if let Some(&pct) = percents.get(node) {
                    return pct;
                }
                // Endpoint healthy but this node absent from the listing.
                debug!(node, "node missing from metrics listing, estimating");
            }
        }
        self.estimate(node).await
    }

    /// Mean CPU across all nodes the core API knows; 50 with no nodes.
    pub async fn cluster_cpu_percent(&self) -> f64 {
        let names: Vec<String> = match self.fetcher.allocatable().await {
            Ok(capacity) => capacity.keys().cloned().collect(),
            Err(err) => {
                debug!(%err, "node listing failed, assuming mid-range cluster CPU");
                return UNKNOWN_CPU_PERCENT;
            }
        };
        if names.is_empty() {
            return UNKNOWN_CPU_PERCENT;
        }

        let mut total = 0.0;
        for name in &names {
            total += self.node_cpu_percent(name).await;
        }
        total / names.len() as f64
    }

    pub fn metrics_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Memory usage for one node as a percentage of allocatable.
    ///
    /// Uncached; used for status reporting, not placement. Estimator mode
    /// has no memory signal and reports a mid-range 50.
    pub async fn node_memory_percent(&self, node: &str) -> f64 {
        if !self.available.load(Ordering::Relaxed) {
            return UNKNOWN_CPU_PERCENT;
        }
        let usage = match self.fetcher.usage().await {
            Ok(usage) => usage,
            Err(err) => {
                self.latch_estimator(&err.to_string());
                return UNKNOWN_CPU_PERCENT;
            }
        };
        let capacity = match self.fetcher.allocatable().await {
            Ok(capacity) => capacity,
            Err(_) => return UNKNOWN_CPU_PERCENT,
        };
        match (usage.get(node), capacity.get(node)) {
            (Some(u), Some(c)) if c.memory_bytes > 0.0 => {
                (u.memory_bytes / c.memory_bytes * 100.0).clamp(0.0, 100.0)
            }
            _ => UNKNOWN_CPU_PERCENT,
        }
    }

    fn cached(&self, node: &str) -> Option<f64> {
        let entry = self.cache.get(node)?;
        if entry.taken.elapsed() < self.ttl {
            Some(entry.cpu_percent)
        } else {
            None
        }
    }

    fn store(&self, node: &str, cpu_percent: f64) {
        self.cache.insert(
            node.to_string(),
            CachedSample {
                cpu_percent,
                taken: Instant::now(),
            },
        );
    }

    /// Fetch usage and allocatable for every node, refresh the cache, and
    /// return the computed percentages. `None` latches estimator mode.
    async fn refresh_all(&self) -> Option<HashMap<String, f64>> {
        let usage = match self.fetcher.usage().await {
            Ok(usage) => usage,
            Err(err) => {
                self.latch_estimator(&err.to_string());
                return None;
            }
        };
        let capacity = match self.fetcher.allocatable().await {
            Ok(capacity) => capacity,
            Err(err) => {
                // The core API failed, not the metrics endpoint; serve this
                // round with nothing rather than latching.
                debug!(%err, "allocatable listing failed");
                return Some(HashMap::new());
            }
        };

        let mut percents = HashMap::new();
        for (name, used) in usage {
            let allocatable = capacity.get(&name).map(|c| c.cpu_millis).unwrap_or(0.0);
            let pct = if allocatable > 0.0 {
                (used.cpu_millis / allocatable * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };
            self.store(&name, pct);
            percents.insert(name, pct);
        }
        Some(percents)
    }

    /// Approximate a node's CPU from its pod count.
    async fn estimate(&self, node: &str) -> f64 {
        let pods = match self.fetcher.pods_on_node(node).await {
            Ok(count) => count,
            Err(err) => {
                debug!(node, %err, "pod count lookup failed, assuming mid-range CPU");
                return UNKNOWN_CPU_PERCENT;
            }
        };
        let estimated = (ESTIMATE_BASE_PERCENT + pods as f64 * ESTIMATE_PER_POD_PERCENT)
            .clamp(0.0, ESTIMATE_CAP_PERCENT);
        self.store(node, estimated);
        debug!(node, pods, estimated, "estimated node CPU from pod count");
        estimated
    }

    /// Enter estimator mode; warns exactly once per process.
    fn latch_estimator(&self, cause: &str) {
        if self.available.swap(false, Ordering::Relaxed) {
            warn!(
                cause,
                "metrics endpoint unavailable, estimating node CPU from pod counts"
            );
        }
    }
}

#[async_trait]
impl<F: UsageFetcher> CpuSource for NodeCpuSource<F> {
    async fn node_cpu_percent(&self, node: &str) -> f64 {
        NodeCpuSource::node_cpu_percent(self, node).await
    }

    async fn cluster_cpu_percent(&self) -> f64 {
        NodeCpuSource::cluster_cpu_percent(self).await
    }

    fn metrics_available(&self) -> bool {
        NodeCpuSource::metrics_available(self)
    }
}
