//! taskgrid-scheduler — the control loop that turns pending TaskManager
//! pods into committed placements.
//!
//! The loop is generic over the [`Orchestrator`](taskgrid_core::Orchestrator)
//! and [`CpuSource`](taskgrid_core::CpuSource) seams, so the whole decision
//! path (discover → filter → observe → select → bind → record) runs under
//! test against in-memory fakes. Production wiring lives in `taskgridd`.

pub mod decision_log;
pub mod scheduler;

pub use decision_log::{DecisionLog, SchedulingReport};
pub use scheduler::Scheduler;
