/// Early-return client
///
/// Runs one transaction through the backend and reports it as data:
/// - Resolves the variant once, before any backend call
/// - Starts and updates atomically for early-return variants
/// - Times both awaits from the same start instant
/// - Turns every failure into a `FAILED` result

// Execution result records and their timestamps
pub mod result;

pub use result::{ExecutionFailure, ExecutionResult, ExecutionStatus, FailureKind, Latencies};

use crate::config::{BackendConfig, ClientConfig};
use crate::runtime::backend::{Backend, BackendError, Code, WorkflowOptions, MULTI_OPERATION_DISABLED};
use crate::transaction::{TransactionRequest, TxResult};
use crate::workflow::registry::{UnknownVariant, Variant, VariantDescriptor};
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::time::Instant;

/// Reported instead of the raw backend message when the atomic call is disabled
pub const MULTI_OPERATION_HINT: &str =
    "UpdateWithStart requires the ExecuteMultiOperation API to be enabled on this namespace.";

/// Why a protocol run failed, before it is flattened into a result record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error(transparent)]
    InvalidArgument(#[from] UnknownVariant),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("timed out after {timeout:?} waiting for {stage}")]
    Timeout { stage: &'static str, timeout: Duration },
}

impl ClientError {
    pub fn classify(&self) -> ExecutionFailure {
        match self {
            ClientError::InvalidArgument(e) => ExecutionFailure {
                kind: FailureKind::InvalidArgument,
                code: Some(Code::InvalidArgument),
                message: e.to_string(),
            },
            ClientError::Backend(BackendError::Status(status))
                if status.code == Code::PermissionDenied && status.message.contains(MULTI_OPERATION_DISABLED) =>
            {
                ExecutionFailure {
                    kind: FailureKind::MultiOperationDisabled,
                    code: Some(status.code),
                    message: MULTI_OPERATION_HINT.to_string(),
                }
            }
            ClientError::Backend(BackendError::Status(status)) => ExecutionFailure {
                kind: FailureKind::Backend,
                code: Some(status.code),
                message: status.message.clone(),
            },
            other => ExecutionFailure {
                kind: FailureKind::Other,
                code: None,
                message: other.to_string(),
            },
        }
    }
}

/// What a run had obtained when it stopped
#[derive(Debug, Default)]
struct Progress {
    latencies: Latencies,
    update_result: Option<TxResult>,
}

/// Coordinates start, early return and terminal result for one transaction
pub struct EarlyReturnClient {
    backend: Arc<dyn Backend>,
    backend_config: BackendConfig,
    config: ClientConfig,
}

impl EarlyReturnClient {
    pub fn new(backend: Arc<dyn Backend>, backend_config: BackendConfig, config: ClientConfig) -> Self {
        Self {
            backend,
            backend_config,
            config,
        }
    }

    /// Execution id used with the backend for a caller-chosen id
    pub fn workflow_id(&self, id: &str) -> String {
        format!("{}{}", self.config.workflow_id_prefix, id)
    }

    /// Run one transaction and report how it went
    ///
    /// Never fails: every error becomes a `FAILED` record carrying its
    /// classification.
    pub async fn run_transaction(&self, variant: &str, id: &str, request: TransactionRequest) -> ExecutionResult {
        let workflow_id = self.workflow_id(id);

        let descriptor = match Variant::resolve(variant) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::warn!("⚠️ Rejecting {}: {}", workflow_id, e);
                return ExecutionResult::failed(
                    workflow_id,
                    None,
                    Latencies::default(),
                    None,
                    ClientError::from(e).classify(),
                );
            }
        };

        let workflow_url = Some(self.backend_config.workflow_url(&workflow_id));
        let options = WorkflowOptions {
            workflow_id: workflow_id.clone(),
            task_queue: self.backend_config.task_queue.clone(),
            variant: descriptor.variant,
            eager_start: descriptor.eager,
        };

        let mut progress = Progress::default();
        match self.execute(descriptor, options, request, &mut progress).await {
            Ok(workflow_result) => {
                let result = ExecutionResult::completed(
                    workflow_id,
                    workflow_url,
                    progress.latencies,
                    progress.update_result,
                    workflow_result,
                );
                tracing::info!("✅ {}", result);
                result
            }
            Err(e) => {
                let failure = e.classify();
                tracing::error!("❌ Execution {} failed ({:?}): {}", workflow_id, failure.kind, e);
                ExecutionResult::failed(
                    workflow_id,
                    workflow_url,
                    progress.latencies,
                    progress.update_result,
                    failure,
                )
            }
        }
    }

    async fn execute(
        &self,
        descriptor: &'static VariantDescriptor,
        options: WorkflowOptions,
        request: TransactionRequest,
        progress: &mut Progress,
    ) -> Result<TxResult, ClientError> {
        let workflow_id = options.workflow_id.clone();
        tracing::debug!("🚀 Starting {} as {}", workflow_id, descriptor.name);

        let started = Instant::now();
        if descriptor.early_return {
            let response = self
                .within("update result", self.backend.update_with_start(options, request))
                .await?;
            progress.latencies.update_ms = elapsed_ms(started);

            let update_result = match response.update {
                Ok(update_result) => update_result,
                Err(failure) => {
                    tracing::warn!("⚠️ Init of {} failed: {}", workflow_id, failure);
                    failure.to_tx_result()
                }
            };
            tracing::debug!(
                "⏱️ Early return for {} after {:.2}ms: {}",
                workflow_id,
                progress.latencies.update_ms,
                update_result.status
            );
            progress.update_result = Some(update_result);
        } else {
            self.within("workflow start", self.backend.start_workflow(options, request))
                .await?;
        }

        let workflow_result = self
            .within("workflow result", self.backend.get_result(&workflow_id))
            .await?;
        progress.latencies.total_ms = elapsed_ms(started);

        Ok(workflow_result)
    }

    async fn within<T, F>(&self, stage: &'static str, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, BackendError>>,
    {
        let timeout = self.config.timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(outcome) => outcome.map_err(ClientError::from),
            Err(_) => Err(ClientError::Timeout { stage, timeout }),
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
