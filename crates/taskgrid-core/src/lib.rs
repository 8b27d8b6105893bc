//! taskgrid-core — shared domain types and trait seams.
//!
//! Everything the other taskgrid crates agree on lives here:
//!
//! - Domain records for nodes, pods, placements, and strategy switches
//! - The `Strategy` tag set and the environment-driven `Config`
//! - Kubernetes resource-quantity parsing (CPU and memory suffixes)
//! - The `Orchestrator` and `CpuSource` trait seams that decouple the
//!   control loop from the live cluster

pub mod config;
pub mod error;
pub mod quantity;
pub mod traits;
pub mod types;

pub use config::{Cascade, Config};
pub use error::{BindError, OrchestratorError};
pub use traits::{CpuSource, Orchestrator};
pub use types::{
    epoch_millis, MetricsSnapshot, NodeRecord, PlacementDecision, PodRecord, Strategy,
    StrategySwitch, UNKNOWN_CPU_PERCENT,
};
