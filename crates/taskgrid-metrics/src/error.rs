//! Metrics ingestion error types.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics api request failed: {0}")]
    Api(String),
    #[error("metrics request timed out after {0:?}")]
    Timeout(Duration),
}
