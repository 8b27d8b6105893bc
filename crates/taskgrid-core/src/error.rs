//! Error taxonomy for orchestrator interactions.

use std::time::Duration;
use thiserror::Error;

/// Outcome classes for a failed binding attempt.
///
/// Conflicts are benign (the pod was claimed elsewhere); forbidden means the
/// scheduler's credentials lack the `pods/binding` verb; everything else is
/// transient and the pod stays pending for the next pass.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("binding conflict: pod is no longer pending")]
    Conflict,
    #[error("binding forbidden: {0}")]
    Forbidden(String),
    #[error("transient binding failure: {0}")]
    Transient(String),
}

/// Failures of listing operations against the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("api request failed: {0}")]
    Api(String),
    #[error("api request timed out after {0:?}")]
    Timeout(Duration),
}
