//! Kubernetes resource-quantity parsing.
//!
//! The metrics API reports CPU as suffixed strings (`1000000000n`, `250m`,
//! `2`) and memory as binary-prefixed byte counts (`512Mi`). Suffix handling
//! is centralized here with an explicit failure mode so callers can decide
//! how to degrade.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid quantity: {0:?}")]
    Invalid(String),
}

/// Parse a CPU quantity into millicores.
///
/// Accepted forms: `n` nanocores, `m` millicores, unit-less cores.
pub fn cpu_millis(raw: &str) -> Result<f64, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }

    if let Some(nanos) = raw.strip_suffix('n') {
        return parse_number(raw, nanos).map(|n| n / 1_000_000.0);
    }
    if let Some(millis) = raw.strip_suffix('m') {
        return parse_number(raw, millis);
    }
    parse_number(raw, raw).map(|cores| cores * 1000.0)
}

/// Parse a memory quantity into bytes.
///
/// Accepted forms: `Ki`, `Mi`, `Gi`, `Ti` binary prefixes and plain bytes.
pub fn memory_bytes(raw: &str) -> Result<f64, QuantityError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(QuantityError::Empty);
    }

    const KIB: f64 = 1024.0;
    let scales = [
        ("Ki", KIB),
        ("Mi", KIB * KIB),
        ("Gi", KIB * KIB * KIB),
        ("Ti", KIB * KIB * KIB * KIB),
    ];
    for (suffix, scale) in scales {
        if let Some(value) = raw.strip_suffix(suffix) {
            return parse_number(raw, value).map(|v| v * scale);
        }
    }
    parse_number(raw, raw)
}

fn parse_number(original: &str, digits: &str) -> Result<f64, QuantityError> {
    digits
        .parse::<f64>()
        .map_err(|_| QuantityError::Invalid(original.to_string()))
}
