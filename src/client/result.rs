/// Execution result records
///
/// What one run of the early-return protocol reports: both latencies, both
/// results and how the run ended. Records are immutable once built.

use crate::runtime::backend::Code;
use crate::transaction::TxResult;
use chrono::{SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// How a protocol run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// Classification of a failed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Unknown workflow type or bad request fields; never retried
    InvalidArgument,
    /// The backend has the atomic start-and-update call turned off
    MultiOperationDisabled,
    /// Any other structured backend failure
    Backend,
    /// Everything else (timeouts, lost connections)
    Other,
}

/// Why a run is `FAILED`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Code>,
    pub message: String,
}

/// Outcome of one protocol run
///
/// `Completed` always carries a workflow result, `Failed` never does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub workflow_id: String,
    /// Zero for variants without an early-return phase
    pub update_response_latency_ms: f64,
    pub workflow_response_latency_ms: f64,
    pub update_result: Option<TxResult>,
    pub workflow_result: Option<TxResult>,
    pub execution_timestamp: String,
    pub execution_status: ExecutionStatus,
    pub workflow_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ExecutionFailure>,
}

/// Latencies measured by a run, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Latencies {
    pub update_ms: f64,
    pub total_ms: f64,
}

impl ExecutionResult {
    pub fn completed(
        workflow_id: impl Into<String>,
        workflow_url: Option<String>,
        latencies: Latencies,
        update_result: Option<TxResult>,
        workflow_result: TxResult,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            update_response_latency_ms: latencies.update_ms,
            workflow_response_latency_ms: latencies.total_ms,
            update_result,
            workflow_result: Some(workflow_result),
            execution_timestamp: execution_timestamp(),
            execution_status: ExecutionStatus::Completed,
            workflow_url,
            failure: None,
        }
    }

    /// A failed run keeps whatever it measured and obtained before failing
    pub fn failed(
        workflow_id: impl Into<String>,
        workflow_url: Option<String>,
        latencies: Latencies,
        update_result: Option<TxResult>,
        failure: ExecutionFailure,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            update_response_latency_ms: latencies.update_ms,
            workflow_response_latency_ms: latencies.total_ms,
            update_result,
            workflow_result: None,
            execution_timestamp: execution_timestamp(),
            execution_status: ExecutionStatus::Failed,
            workflow_url,
            failure: Some(failure),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.execution_status == ExecutionStatus::Completed
    }
}

impl std::fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ExecutionResult{{workflowId='{}', updateLatency={:.2}ms, workflowLatency={:.2}ms, status={:?}, url='{}'}}",
            self.workflow_id,
            self.update_response_latency_ms,
            self.workflow_response_latency_ms,
            self.execution_status,
            self.workflow_url.as_deref().unwrap_or("")
        )
    }
}

static LAST_TIMESTAMP_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Completion timestamp, strictly increasing within the process
///
/// Fixed-width RFC 3339 (microseconds, `Z`), so lexical order is
/// chronological order.
pub fn execution_timestamp() -> String {
    let now = Utc::now().timestamp_micros();
    let mut previous = LAST_TIMESTAMP_MICROS.load(Ordering::Relaxed);
    let stamped = loop {
        let next = now.max(previous.saturating_add(1));
        match LAST_TIMESTAMP_MICROS.compare_exchange_weak(previous, next, Ordering::SeqCst, Ordering::Relaxed) {
            Ok(_) => break next,
            Err(current) => previous = current,
        }
    };

    match Utc.timestamp_micros(stamped).single() {
        Some(at) => at.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    }
}
