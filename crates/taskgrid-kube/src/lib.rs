//! taskgrid-kube — the orchestrator client.
//!
//! A thin capability layer over the Kubernetes API: list nodes, list the
//! pending pods this scheduler has claimed, and commit placements through
//! the pod `binding` subresource. Conversion into the domain records from
//! `taskgrid-core` happens here, so nothing downstream touches API objects.

pub mod client;
pub mod convert;

pub use client::{KubeOrchestrator, COMPONENT_SELECTOR, SCHEDULER_NAME};
