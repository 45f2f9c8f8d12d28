/// In-process execution engine
///
/// Implements the backend primitives inside this process: executions live in
/// a map keyed by workflow id, non-eager starts travel through a per-queue
/// dispatch path to whichever workers poll that queue, and eager starts are
/// handed to a local worker immediately. Nothing is persisted.

use crate::config::BackendConfig;
use crate::runtime::backend::{
    Backend, BackendError, Code, ExecutionDescription, Status, UpdateWithStartResponse, WorkflowExecution,
    WorkflowOptions, MULTI_OPERATION_DISABLED,
};
use crate::transaction::{ActivityRunner, TransactionRequest, TxResult};
use crate::workflow::unit::TransactionWorkflow;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::sync::{mpsc, watch, Mutex};

/// Terminal outcome of an execution as seen by `get_result`
type Outcome = Result<TxResult, Status>;

/// One started execution
#[derive(Debug)]
pub struct Execution {
    pub workflow_id: String,
    pub run_id: String,
    pub task_queue: String,
    unit: Arc<TransactionWorkflow>,
    request: TransactionRequest,
    outcome: watch::Sender<Option<Outcome>>,
}

impl Execution {
    pub fn unit(&self) -> &Arc<TransactionWorkflow> {
        &self.unit
    }

    /// Run the unit's main path to completion and publish its outcome
    pub async fn run(&self, runner: ActivityRunner) {
        let request = self.request.clone();
        let outcome = self
            .unit
            .process_transaction(&runner, request)
            .await
            .map_err(|e| Status::new(Code::Aborted, format!("workflow execution failed: {}", e)));

        match &outcome {
            Ok(result) => tracing::info!(
                "✅ Execution {} completed: {} (transactionId: {})",
                self.workflow_id,
                result.status,
                result.transaction_id
            ),
            Err(status) => tracing::error!("❌ Execution {} failed: {}", self.workflow_id, status),
        }
        self.outcome.send_replace(Some(outcome));
    }

    fn describe(&self) -> ExecutionDescription {
        ExecutionDescription {
            workflow_id: self.workflow_id.clone(),
            run_id: self.run_id.clone(),
            variant: self.unit.descriptor().variant,
            task_queue: self.task_queue.clone(),
            phase: self.unit.phase(),
            update_result: self.unit.update_result(),
        }
    }
}

/// Work item delivered to a worker
pub type WorkflowTask = Arc<Execution>;

/// Pollers and undelivered work for one dispatch queue
#[derive(Debug, Default)]
struct QueueState {
    workers: Vec<mpsc::UnboundedSender<WorkflowTask>>,
    pending: Vec<WorkflowTask>,
    next: usize,
}

impl QueueState {
    /// Hand a task to the next live worker, or park it until one registers
    fn deliver(&mut self, mut task: WorkflowTask) {
        self.workers.retain(|worker| !worker.is_closed());
        while !self.workers.is_empty() {
            let index = self.next % self.workers.len();
            self.next = self.next.wrapping_add(1);
            match self.workers[index].send(task) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    self.workers.remove(index);
                    task = returned;
                }
            }
        }
        self.pending.push(task);
    }

    fn has_live_worker(&mut self) -> bool {
        self.workers.retain(|worker| !worker.is_closed());
        !self.workers.is_empty()
    }
}

#[derive(Debug)]
struct Inner {
    multi_operation_enabled: bool,
    dispatch_delay: Duration,
    retained_executions: usize,
    executions: Mutex<HashMap<String, Arc<Execution>>>,
    queues: Mutex<HashMap<String, QueueState>>,
}

/// Backend that runs executions on this process's tokio runtime
#[derive(Debug, Clone)]
pub struct InProcessBackend {
    inner: Arc<Inner>,
}

impl InProcessBackend {
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                multi_operation_enabled: config.multi_operation_enabled,
                dispatch_delay: config.dispatch_delay(),
                retained_executions: config.retained_executions,
                executions: Mutex::new(HashMap::new()),
                queues: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Register a poller for `task_queue`
    ///
    /// Work parked while the queue had no pollers is delivered right away.
    pub async fn register_worker(&self, task_queue: &str) -> mpsc::UnboundedReceiver<WorkflowTask> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut queues = self.inner.queues.lock().await;
        let queue = queues.entry(task_queue.to_string()).or_default();
        queue.workers.push(sender);

        let parked = std::mem::take(&mut queue.pending);
        if !parked.is_empty() {
            tracing::info!("📤 Delivering {} parked executions on queue {}", parked.len(), task_queue);
        }
        for task in parked {
            queue.deliver(task);
        }
        receiver
    }

    /// Create and record a new execution
    ///
    /// An id is taken only while its run is still going; a finished run is
    /// replaced. Once the retention limit is reached, finished runs are
    /// evicted before the new one is recorded.
    async fn create_execution(
        &self,
        options: &WorkflowOptions,
        request: TransactionRequest,
    ) -> Result<Arc<Execution>, BackendError> {
        let mut executions = self.inner.executions.lock().await;
        if let Some(existing) = executions.get(&options.workflow_id) {
            if !existing.unit().phase().is_terminal() {
                return Err(Status::new(
                    Code::AlreadyExists,
                    format!("workflow execution already started: {}", options.workflow_id),
                )
                .into());
            }
            tracing::debug!("♻️ Reusing id {} of a finished execution", options.workflow_id);
        }

        if executions.len() >= self.inner.retained_executions {
            let before = executions.len();
            executions.retain(|_, execution| !execution.unit().phase().is_terminal());
            tracing::info!(
                "🧹 Evicted {} finished executions (limit {})",
                before - executions.len(),
                self.inner.retained_executions
            );
        }

        let (outcome, _) = watch::channel(None);
        let execution = Arc::new(Execution {
            workflow_id: options.workflow_id.clone(),
            run_id: uuid::Uuid::new_v4().to_string(),
            task_queue: options.task_queue.clone(),
            unit: Arc::new(TransactionWorkflow::new(options.variant.descriptor())),
            request,
            outcome,
        });
        executions.insert(options.workflow_id.clone(), Arc::clone(&execution));
        Ok(execution)
    }

    /// Route a new execution to a worker
    async fn dispatch(&self, execution: Arc<Execution>, eager: bool) {
        if eager {
            let mut queues = self.inner.queues.lock().await;
            if let Some(queue) = queues.get_mut(&execution.task_queue) {
                if queue.has_live_worker() {
                    tracing::debug!("⚡ Eager start of {} on a local worker", execution.workflow_id);
                    queue.deliver(execution);
                    return;
                }
            }
            tracing::debug!(
                "No local worker polls {}; {} falls back to normal dispatch",
                execution.task_queue,
                execution.workflow_id
            );
        }

        let backend = self.clone();
        let delay = self.inner.dispatch_delay;
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let mut queues = backend.inner.queues.lock().await;
            queues
                .entry(execution.task_queue.clone())
                .or_default()
                .deliver(execution);
        });
    }

    async fn lookup(&self, workflow_id: &str) -> Result<Arc<Execution>, BackendError> {
        self.inner
            .executions
            .lock()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| Status::new(Code::NotFound, format!("workflow not found: {}", workflow_id)).into())
    }
}

#[async_trait]
impl Backend for InProcessBackend {
    async fn start_workflow(
        &self,
        options: WorkflowOptions,
        request: TransactionRequest,
    ) -> Result<WorkflowExecution, BackendError> {
        let execution = self.create_execution(&options, request).await?;
        tracing::info!(
            "🚀 Started {} execution {} on queue {}",
            options.variant,
            execution.workflow_id,
            execution.task_queue
        );
        let started = WorkflowExecution {
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
        };
        self.dispatch(execution, options.eager_start).await;
        Ok(started)
    }

    async fn update_with_start(
        &self,
        options: WorkflowOptions,
        request: TransactionRequest,
    ) -> Result<UpdateWithStartResponse, BackendError> {
        if !self.inner.multi_operation_enabled {
            return Err(Status::new(Code::PermissionDenied, MULTI_OPERATION_DISABLED).into());
        }

        let execution = self.create_execution(&options, request).await?;
        tracing::info!(
            "🚀 Started {} execution {} with update on queue {}",
            options.variant,
            execution.workflow_id,
            execution.task_queue
        );

        // the update is bound to the unit before any worker can see it
        let unit = Arc::clone(execution.unit());
        let update = async move { unit.return_init_result().await };
        let started = WorkflowExecution {
            workflow_id: execution.workflow_id.clone(),
            run_id: execution.run_id.clone(),
        };
        self.dispatch(execution, options.eager_start).await;

        Ok(UpdateWithStartResponse {
            execution: started,
            update: update.await,
        })
    }

    async fn get_result(&self, workflow_id: &str) -> Result<TxResult, BackendError> {
        let execution = self.lookup(workflow_id).await?;
        let mut outcome = execution.outcome.subscribe();
        let finished = match outcome.wait_for(Option::is_some).await {
            Ok(finished) => (*finished).clone(),
            Err(_) => None,
        };

        match finished {
            Some(Ok(result)) => Ok(result),
            Some(Err(status)) => Err(status.into()),
            None => Err(BackendError::Closed(format!(
                "execution {} dropped before completing",
                workflow_id
            ))),
        }
    }

    async fn describe(&self, workflow_id: &str) -> Result<ExecutionDescription, BackendError> {
        Ok(self.lookup(workflow_id).await?.describe())
    }
}
