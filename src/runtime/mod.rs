/// Execution runtime
///
/// This module provides everything between the early-return client and the
/// execution units:
/// - The backend seam the client talks to
/// - An in-process engine implementing it on tokio
/// - The worker that polls the engine's dispatch queues

// Backend primitives and status vocabulary
pub mod backend;

// In-process engine: executions, dispatch queues, eager start
pub mod engine;

// Queue-polling worker with a lifecycle handle
pub mod worker;

// Re-export main types
pub use backend::{Backend, BackendError, Code, Status, WorkflowOptions};
pub use engine::InProcessBackend;
pub use worker::{Worker, WorkerHandle, WorkerStatus};
