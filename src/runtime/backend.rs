/// Execution backend seam
///
/// The primitives the early-return client needs from a durable execution
/// backend: start, atomic start-and-update, terminal result and an
/// out-of-band description of a running execution.

use crate::transaction::{TransactionRequest, TxResult};
use crate::workflow::{registry::Variant, unit::InitFailure, Phase};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Backend status codes (gRPC vocabulary)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Code {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    FailedPrecondition,
    Aborted,
    DeadlineExceeded,
    Unavailable,
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::Unavailable => "UNAVAILABLE",
            Code::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Message the backend uses when the atomic start-and-update call is turned off
pub const MULTI_OPERATION_DISABLED: &str = "ExecuteMultiOperation API is disabled on this namespace";

/// Errors returned by a backend call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{0}")]
    Status(#[from] Status),

    /// The connection to the backend went away mid-call
    #[error("backend connection closed: {0}")]
    Closed(String),
}

impl BackendError {
    pub fn status(&self) -> Option<&Status> {
        match self {
            BackendError::Status(status) => Some(status),
            BackendError::Closed(_) => None,
        }
    }
}

/// How to start an execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOptions {
    pub workflow_id: String,
    pub task_queue: String,
    pub variant: Variant,
    /// Ask the backend to hand the execution to a local worker directly
    pub eager_start: bool,
}

/// Identity of a started execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

/// Reply to the atomic start-and-update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateWithStartResponse {
    pub execution: WorkflowExecution,
    /// What the early-return accessor returned, or the init error it re-raised
    pub update: Result<TxResult, InitFailure>,
}

/// Snapshot of an execution, readable while it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDescription {
    pub workflow_id: String,
    pub run_id: String,
    pub variant: Variant,
    pub task_queue: String,
    pub phase: Phase,
    pub update_result: Option<TxResult>,
}

/// Durable execution backend primitives
#[async_trait]
pub trait Backend: Send + Sync {
    /// Start an execution without waiting for any of its phases
    async fn start_workflow(
        &self,
        options: WorkflowOptions,
        request: TransactionRequest,
    ) -> Result<WorkflowExecution, BackendError>;

    /// Start an execution and run its early-return accessor as one request
    ///
    /// Returns once the accessor has produced a result. The update is attached
    /// before the execution can make progress, so it can never target an
    /// execution that does not exist yet.
    async fn update_with_start(
        &self,
        options: WorkflowOptions,
        request: TransactionRequest,
    ) -> Result<UpdateWithStartResponse, BackendError>;

    /// Wait for the terminal result of an execution
    async fn get_result(&self, workflow_id: &str) -> Result<TxResult, BackendError>;

    /// Describe an execution without waiting
    async fn describe(&self, workflow_id: &str) -> Result<ExecutionDescription, BackendError>;
}
