/// Server setup and initialization
///
/// Wires together all components: execution backend, worker, early-return
/// client, result store and HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_status_routes, create_workflow_routes, AppState},
    client::EarlyReturnClient,
    config::Config,
    runtime::{Backend, InProcessBackend, Worker},
    store::ResultsStore,
    transaction::{ActivityDelays, SimulatedActivities, TransactionActivities},
};
use anyhow::Result;
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Create the main Axum application with the simulated transfer activities
pub async fn create_app(config: Config) -> Result<Router> {
    let activities = Arc::new(SimulatedActivities::new(ActivityDelays::default()));
    create_app_with_activities(config, activities).await
}

/// Create the main Axum application with all routes and middleware
///
/// Starts the in-process backend and its worker before any route is served,
/// so the first run never waits on a missing worker.
pub async fn create_app_with_activities(
    config: Config,
    activities: Arc<dyn TransactionActivities>,
) -> Result<Router> {
    if config.client.timeout_secs == 0 {
        return Err(anyhow::anyhow!("CALLER_API_TIMEOUT_SECS must be greater than zero"));
    }

    tracing::info!(
        "🏗️ Initializing execution backend (namespace: {}, address: {})",
        config.backend.namespace,
        config.backend.address
    );
    let backend = InProcessBackend::new(&config.backend);
    if !config.backend.multi_operation_enabled {
        tracing::warn!("⚠️ Atomic start-and-update is disabled; early-return variants will fail");
    }

    tracing::info!("👷 Starting worker on task queue: {}", config.backend.task_queue);
    let worker = Worker::new(
        backend.clone(),
        config.backend.task_queue.clone(),
        activities,
        config.backend.remote_activity_hop(),
    );
    let worker_handle = Arc::new(worker.start().await);

    tracing::info!("🚀 Initializing early-return client");
    let backend: Arc<dyn Backend> = Arc::new(backend);
    let client = Arc::new(EarlyReturnClient::new(
        Arc::clone(&backend),
        config.backend.clone(),
        config.client.clone(),
    ));

    tracing::info!("🏗️ Creating application state");
    let app_state = AppState {
        client,
        store: Arc::new(ResultsStore::new()),
        backend,
        server_info: config.backend.server_info(),
        worker: worker_handle,
    };

    tracing::info!("📡 Creating HTTP router with all endpoints");
    let app = Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Run and result routes
        .merge(create_workflow_routes())
        // Diagnostics routes
        .merge(create_status_routes())
        .with_state(app_state);

    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and serves it on the configured address and port
/// until Ctrl-C.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging, RUST_LOG overrides the level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting latency-optimization caller service...");

    // Create the application
    let app = create_app(config.clone()).await?;

    // Bind to the configured address
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);
    tracing::info!("Executions visible at {}", config.backend.namespace_url());

    // Start the server
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("❌ Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("🛑 Shutdown requested");
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
