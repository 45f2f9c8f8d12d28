/// Configuration management for the latency-optimization service
///
/// Handles HTTP server settings, execution backend connection parameters and
/// the knobs of the early-return client. Built once at startup from the
/// environment and handed to every component by value.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Execution backend connection configuration
    pub backend: BackendConfig,
    /// Early-return client configuration
    pub client: ClientConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Execution backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend address (e.g., "localhost:7233")
    pub address: String,
    /// Namespace executions are started in
    pub namespace: String,
    /// Dispatch queue polled by the worker
    pub task_queue: String,
    /// mTLS private key path, reported for diagnostics only
    pub mtls_key_file: String,
    /// mTLS certificate chain path, reported for diagnostics only
    pub mtls_cert_chain_file: String,
    /// Port of the backend web UI, used to build execution URLs
    pub web_port: u16,
    /// Whether the atomic start-and-update call is enabled on the namespace
    pub multi_operation_enabled: bool,
    /// Delay between enqueueing a non-eager execution and a worker receiving it
    pub dispatch_delay_ms: u64,
    /// Extra hop paid by each activity dispatched to a remote worker
    pub remote_activity_hop_ms: u64,
    /// Executions kept in memory before finished ones are evicted
    pub retained_executions: usize,
}

/// Early-return client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Prefix prepended to every execution id
    pub workflow_id_prefix: String,
    /// Upper bound for each await on the backend (update result, terminal result)
    pub timeout_secs: u64,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for container deployment
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl Config {
    /// Build a configuration from an arbitrary key lookup
    ///
    /// Empty values are treated as absent; values that fail to parse fall back
    /// to the documented default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            server: ServerConfig {
                host: get("CALLER_API_HOST", "0.0.0.0"),
                port: get("CALLER_API_PORT", "7070").parse().unwrap_or(7070),
            },
            backend: BackendConfig {
                address: get("TEMPORAL_CONNECTION_TARGET", "localhost:7233"),
                namespace: get("TEMPORAL_CONNECTION_NAMESPACE", "default"),
                task_queue: get("TEMPORAL_TASK_QUEUE", "LatencyOptimization"),
                mtls_key_file: get("TEMPORAL_CONNECTION_MTLS_KEY_FILE", ""),
                mtls_cert_chain_file: get("TEMPORAL_CONNECTION_MTLS_CERT_CHAIN_FILE", ""),
                web_port: get("TEMPORAL_WEB_PORT", "8233").parse().unwrap_or(8233),
                multi_operation_enabled: get("TEMPORAL_MULTI_OPERATION_ENABLED", "true")
                    .parse()
                    .unwrap_or(true),
                dispatch_delay_ms: get("BACKEND_DISPATCH_DELAY_MS", "25").parse().unwrap_or(25),
                remote_activity_hop_ms: get("BACKEND_REMOTE_ACTIVITY_HOP_MS", "5")
                    .parse()
                    .unwrap_or(5),
                retained_executions: get("BACKEND_RETAINED_EXECUTIONS", "10000")
                    .parse()
                    .unwrap_or(10_000),
            },
            client: ClientConfig {
                workflow_id_prefix: get("WORKFLOW_ID_PREFIX", ""),
                timeout_secs: get("CALLER_API_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            },
        }
    }
}

impl BackendConfig {
    pub fn dispatch_delay(&self) -> Duration {
        Duration::from_millis(self.dispatch_delay_ms)
    }

    pub fn remote_activity_hop(&self) -> Duration {
        Duration::from_millis(self.remote_activity_hop_ms)
    }

    /// Web UI link for a namespace
    ///
    /// Local development servers are addressed through the configured web
    /// port; anything else is assumed to be a hosted namespace.
    pub fn namespace_url(&self) -> String {
        if self.address.to_lowercase().contains("localhost") {
            format!("http://localhost:{}/namespaces/{}", self.web_port, self.namespace)
        } else {
            format!("https://cloud.temporal.io/namespaces/{}", self.namespace)
        }
    }

    /// Web UI link for a single execution
    pub fn workflow_url(&self, workflow_id: &str) -> String {
        format!("{}/workflows/{}", self.namespace_url(), workflow_id)
    }

    /// Connection diagnostics exposed at `GET /`
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            cert_path: self.mtls_cert_chain_file.clone(),
            key_path: self.mtls_key_file.clone(),
            namespace: self.namespace.clone(),
            address: self.address.clone(),
            task_queue: self.task_queue.clone(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Effective backend connection settings, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub cert_path: String,
    pub key_path: String,
    pub namespace: String,
    pub address: String,
    pub task_queue: String,
}
