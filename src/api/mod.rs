/// HTTP API Layer
///
/// This module provides the REST API endpoints of the caller service. It handles:
/// - Triggering batches of transaction executions
/// - Serving and clearing aggregated results
/// - Worker, backend and execution diagnostics

// Run and result endpoints
pub mod workflows;

// Diagnostics endpoints
pub mod status;

// Re-export router builders
pub use status::create_status_routes;
pub use workflows::{create_workflow_routes, AppState};
