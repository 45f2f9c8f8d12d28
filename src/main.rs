/// Latency optimization caller service
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server with an in-process execution backend and worker.

use latency_optimization::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Transaction runs at POST /runWorkflow
/// - Aggregated results at /workflows and /workflows/{id}
/// - Diagnostics at /, /workerstatus, /executions/{id} and /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration (defaults to 0.0.0.0:7070 and a local backend)
    let config = Config::default();

    // Start the server
    start_server(config).await?;

    Ok(())
}
