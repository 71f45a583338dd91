//! The per-operation record persisted by the load generator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{DurationUnit, Operation};

/// Outcome of a single operation issued by the load generator.
///
/// Exactly one of these is written per iteration. The duration may be given either as
/// `durationNanos` or as `durationMillis`; when both are present, nanoseconds take precedence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    /// Zero-based, strictly increasing sequence index within a run.
    pub iter: u64,
    /// The kind of operation that was issued.
    pub op: Operation,
    /// HTTP status of the response, absent on transport failures.
    #[serde(default, alias = "code", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Whether a non-error response was received.
    #[serde(default)]
    pub ok: bool,
    /// Elapsed time of the request in nanoseconds.
    #[serde(default, alias = "duration_ns", skip_serializing_if = "Option::is_none")]
    pub duration_nanos: Option<u64>,
    /// Elapsed time of the request in milliseconds.
    #[serde(default, alias = "duration_ms", skip_serializing_if = "Option::is_none")]
    pub duration_millis: Option<f64>,
    /// Full request URL, only captured with detailed logging.
    #[serde(default, alias = "request_url", skip_serializing_if = "Option::is_none")]
    pub request_url: Option<String>,
    /// Request body, only captured with detailed logging.
    #[serde(default, alias = "request_body", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    /// Response body, only captured with detailed logging.
    #[serde(default, alias = "response_body", skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
}

impl OperationRecord {
    /// Creates a record without duration or captured details.
    pub fn new(iter: u64, op: Operation, status_code: Option<u16>, ok: bool) -> Self {
        Self {
            iter,
            op,
            status_code,
            ok,
            duration_nanos: None,
            duration_millis: None,
            request_url: None,
            request_body: None,
            response_body: None,
        }
    }

    /// Sets the measured duration, stored with nanosecond resolution.
    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_nanos = Some(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));
        self
    }

    /// Returns the recorded duration expressed in `unit`, if any duration field is present.
    pub fn duration_in(&self, unit: DurationUnit) -> Option<f64> {
        if let Some(nanos) = self.duration_nanos {
            return Some(unit.convert(nanos as f64, DurationUnit::Nanoseconds));
        }
        self.duration_millis
            .map(|millis| unit.convert(millis, DurationUnit::Milliseconds))
    }
}
