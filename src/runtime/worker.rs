/// Background execution worker
///
/// Polls one dispatch queue of the in-process engine and runs every execution
/// it receives on its own task, with steps executed through the unit's
/// dispatch mode. `start()` hands back the only way to observe or stop it.

use crate::runtime::engine::{InProcessBackend, WorkflowTask};
use crate::transaction::{ActivityRunner, TransactionActivities};
use serde::{Deserialize, Serialize};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::oneshot, task::JoinHandle};

/// Worker configuration before it is started
pub struct Worker {
    backend: InProcessBackend,
    task_queue: String,
    activities: Arc<dyn TransactionActivities>,
    remote_hop: Duration,
}

/// Reported at `GET /workerstatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub status: String,
    pub task_queue: String,
}

/// Handle to a running worker; dropping it stops the poll loop
#[derive(Debug)]
pub struct WorkerHandle {
    task_queue: String,
    running: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(
        backend: InProcessBackend,
        task_queue: impl Into<String>,
        activities: Arc<dyn TransactionActivities>,
        remote_hop: Duration,
    ) -> Self {
        Self {
            backend,
            task_queue: task_queue.into(),
            activities,
            remote_hop,
        }
    }

    /// Register with the engine and start polling
    pub async fn start(self) -> WorkerHandle {
        let mut tasks = self.backend.register_worker(&self.task_queue).await;
        let (shutdown, mut stop) = oneshot::channel();
        let running = Arc::new(AtomicBool::new(true));

        let task_queue = self.task_queue.clone();
        let flag = Arc::clone(&running);
        let activities = self.activities;
        let remote_hop = self.remote_hop;

        let join = tokio::spawn(async move {
            tracing::info!("👷 Worker started on task queue: {}", task_queue);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    task = tasks.recv() => match task {
                        Some(task) => spawn_execution(task, Arc::clone(&activities), remote_hop),
                        None => break,
                    },
                }
            }
            flag.store(false, Ordering::SeqCst);
            tracing::info!("⏹️ Worker on task queue {} stopped", task_queue);
        });

        WorkerHandle {
            task_queue: self.task_queue,
            running,
            shutdown: Some(shutdown),
            join: Some(join),
        }
    }
}

fn spawn_execution(task: WorkflowTask, activities: Arc<dyn TransactionActivities>, remote_hop: Duration) {
    let runner = ActivityRunner::new(activities, task.unit().descriptor().dispatch, remote_hop);
    tracing::debug!(
        "📥 Worker picked up {} ({:?} steps)",
        task.workflow_id,
        runner.mode()
    );
    tokio::spawn(async move { task.run(runner).await });
}

impl WorkerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> WorkerStatus {
        WorkerStatus {
            status: if self.is_running() { "running" } else { "stopped" }.to_string(),
            task_queue: self.task_queue.clone(),
        }
    }

    /// Stop polling and wait for the loop to exit
    ///
    /// Executions already picked up keep running to completion.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::error!("❌ Worker loop ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::runtime::backend::{Backend, WorkflowOptions};
    use crate::transaction::{ActivityDelays, SimulatedActivities, TransactionRequest};
    use crate::workflow::registry::Variant;

    fn setup() -> (InProcessBackend, Worker) {
        let mut config = Config::from_lookup(|_| None).backend;
        config.dispatch_delay_ms = 0;
        let backend = InProcessBackend::new(&config);
        let worker = Worker::new(
            backend.clone(),
            "worker-queue",
            Arc::new(SimulatedActivities::new(ActivityDelays::none())),
            Duration::ZERO,
        );
        (backend, worker)
    }

    #[tokio::test]
    async fn test_handle_reports_status_and_stops() {
        let (_backend, worker) = setup();
        let handle = worker.start().await;

        assert!(handle.is_running());
        assert_eq!(
            handle.status(),
            WorkerStatus {
                status: "running".to_string(),
                task_queue: "worker-queue".to_string()
            }
        );

        let running = Arc::clone(&handle.running);
        handle.shutdown().await;
        assert!(!running.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_worker_runs_plain_start_variants() {
        let (backend, worker) = setup();
        let _handle = worker.start().await;

        for (index, variant) in [Variant::RegularActivities, Variant::LocalActivities, Variant::EagerLocalActivities]
            .into_iter()
            .enumerate()
        {
            let workflow_id = format!("wf-{}", index);
            backend
                .start_workflow(
                    WorkflowOptions {
                        workflow_id: workflow_id.clone(),
                        task_queue: "worker-queue".to_string(),
                        variant,
                        eager_start: variant.descriptor().eager,
                    },
                    TransactionRequest::new("Bob", "Alice", 250),
                )
                .await
                .unwrap();

            let result = backend.get_result(&workflow_id).await.unwrap();
            assert_eq!(result.status, "Transaction completed");
        }
    }
}
