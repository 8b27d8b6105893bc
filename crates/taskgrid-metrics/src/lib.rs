//! taskgrid-metrics — per-node CPU readings for placement decisions.
//!
//! The [`NodeCpuSource`] converts raw usage from the cluster's metrics
//! subsystem into percentages of allocatable CPU, caches them under a short
//! TTL, and degrades to a pod-count estimator when the metrics subsystem is
//! unavailable. The fetch path sits behind the [`UsageFetcher`] trait so the
//! cache and fallback logic are tested against fakes.

pub mod error;
pub mod fetcher;
pub mod source;

pub use error::MetricsError;
pub use fetcher::{MetricsApiFetcher, NodeCapacity, NodeUsage, UsageFetcher};
pub use source::NodeCpuSource;
