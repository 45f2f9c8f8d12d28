/// Diagnostics endpoints
///
/// Backend connection settings, worker lifecycle and live execution state.

use crate::{
    api::workflows::AppState,
    config::ServerInfo,
    runtime::{backend::ExecutionDescription, BackendError, Code, WorkerStatus},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};

/// Create diagnostics routes
pub fn create_status_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(server_info))
        .route("/workerstatus", get(worker_status))
        .route("/executions/{id}", get(describe_execution))
}

/// GET /
async fn server_info(State(state): State<AppState>) -> Json<ServerInfo> {
    Json(state.server_info)
}

/// GET /workerstatus
/// Returns: { "status": "running", "taskQueue": "..." }
async fn worker_status(State(state): State<AppState>) -> Json<WorkerStatus> {
    Json(state.worker.status())
}

/// Current phase of one execution, without waiting on it
///
/// GET /executions/{id}
/// `id` is the per-iteration id, e.g. "t1-iteration-1"; the configured
/// workflow id prefix is applied here, as it is when the run starts.
async fn describe_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionDescription>, (StatusCode, String)> {
    let id = state.client.workflow_id(&id);
    match state.backend.describe(&id).await {
        Ok(description) => Ok(Json(description)),
        Err(BackendError::Status(status)) if status.code == Code::NotFound => {
            Err((StatusCode::NOT_FOUND, status.message))
        }
        Err(e) => {
            tracing::error!("❌ Failed to describe execution {}: {}", id, e);
            Err((StatusCode::BAD_GATEWAY, e.to_string()))
        }
    }
}
