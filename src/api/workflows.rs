/// Workflow run and result REST API endpoints
///
/// Triggers batches of transaction executions and serves the aggregated
/// results they produce. Execution failures never surface as HTTP errors;
/// they are part of the returned results.

use crate::{
    client::EarlyReturnClient,
    config::ServerInfo,
    runtime::{Backend, WorkerHandle},
    store::{AggregatedResponse, ResultsStore},
    transaction::TransactionRequest,
    workflow::registry::Variant,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{collections::HashMap, sync::Arc};
use tokio::task::JoinSet;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Early-return client every run goes through
    pub client: Arc<EarlyReturnClient>,
    /// Aggregated results, keyed by request id
    pub store: Arc<ResultsStore>,
    /// Backend, for out-of-band execution queries
    pub backend: Arc<dyn Backend>,
    /// Connection diagnostics reported at `GET /`
    pub server_info: ServerInfo,
    /// Lifecycle handle of the background worker
    pub worker: Arc<WorkerHandle>,
}

/// Request body for `POST /runWorkflow`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    pub id: String,
    pub wf_type: String,
    pub iterations: u32,
    pub params: TransactionRequest,
}

type ApiError = (StatusCode, String);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

fn not_found() -> ApiError {
    (StatusCode::NOT_FOUND, "Workflow not found".to_string())
}

/// Create workflow run and result routes
pub fn create_workflow_routes() -> Router<AppState> {
    Router::new()
        .route("/runWorkflow", post(run_workflow))
        .route("/workflows", get(list_workflows))
        .route("/workflows", delete(clear_workflows))
        .route("/workflows/{id}", get(get_workflow))
        .route("/workflows/{id}", delete(clear_workflow))
}

/// Run a batch of transaction executions
///
/// POST /runWorkflow
/// Body: { "id": "t1", "wf_type": "...", "iterations": 2, "params": { "sourceAccount": "...", "targetAccount": "...", "amount": 1000 } }
/// Returns: the aggregated response for `id`, including earlier runs under the same id
async fn run_workflow(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<AggregatedResponse>, ApiError> {
    tracing::debug!("📄 Request body: {}", body);

    // Parse JSON body manually to report errors as plain text
    let request: RunWorkflowRequest = serde_json::from_str(&body).map_err(|e| {
        tracing::warn!("⚠️ Invalid run request: {}", e);
        bad_request(format!("Invalid request body: {}", e))
    })?;

    if request.id.is_empty() {
        return Err(bad_request("id must not be empty"));
    }
    if request.iterations == 0 {
        return Err(bad_request("iterations must be at least 1"));
    }
    Variant::resolve(&request.wf_type).map_err(|e| bad_request(e.to_string()))?;

    tracing::info!(
        "🔥 Running {} x{} as {}",
        request.id,
        request.iterations,
        request.wf_type
    );

    // The batch outlives this handler, so a caller that disconnects still
    // gets its results recorded
    let batch = tokio::spawn(run_iterations(
        Arc::clone(&state.client),
        Arc::clone(&state.store),
        request.clone(),
    ));
    if let Err(e) = batch.await {
        tracing::error!("❌ Batch {} aborted: {}", request.id, e);
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Batch aborted".to_string()));
    }

    state.store.get(&request.id).map(Json).ok_or_else(|| {
        tracing::error!("❌ Results for {} vanished before they could be returned", request.id);
        (StatusCode::INTERNAL_SERVER_ERROR, "Results were cleared during the run".to_string())
    })
}

/// Run every iteration of one request concurrently and record each result
async fn run_iterations(client: Arc<EarlyReturnClient>, store: Arc<ResultsStore>, request: RunWorkflowRequest) {
    let mut runs = JoinSet::new();
    for iteration in 1..=request.iterations {
        let client = Arc::clone(&client);
        let store = Arc::clone(&store);
        let request = request.clone();

        runs.spawn(async move {
            let execution_id = format!("{}-iteration-{}", request.id, iteration);
            let result = client
                .run_transaction(&request.wf_type, &execution_id, request.params.clone())
                .await;
            store.append(&request.id, request.iterations, &request.wf_type, result);
        });
    }

    while let Some(joined) = runs.join_next().await {
        if let Err(e) = joined {
            tracing::error!("❌ Iteration of {} aborted: {}", request.id, e);
        }
    }
}

/// List aggregated responses
///
/// GET /workflows[?limit=N]
/// A valid `limit` returns the N responses with the newest results; anything
/// else returns every response.
async fn list_workflows(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<AggregatedResponse>> {
    let responses = match params.get("limit").map(|limit| limit.parse::<usize>()) {
        Some(Ok(limit)) => state.store.list_recent(limit),
        Some(Err(_)) => {
            tracing::debug!("Ignoring invalid limit, returning all responses");
            state.store.list_all()
        }
        None => state.store.list_all(),
    };

    Json(responses)
}

/// GET /workflows/{id}
async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AggregatedResponse>, ApiError> {
    state.store.get(&id).map(Json).ok_or_else(not_found)
}

/// DELETE /workflows/{id}
async fn clear_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.store.clear(&id) {
        Ok(Json(json!({ "message": "Workflow results cleared" })))
    } else {
        Err(not_found())
    }
}

/// DELETE /workflows
async fn clear_workflows(State(state): State<AppState>) -> Json<Value> {
    state.store.clear_all();
    Json(json!({ "message": "All workflow results cleared" }))
}
