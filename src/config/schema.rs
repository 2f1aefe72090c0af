//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the vault gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VaultConfig {
    /// Listener configuration (bind address, limits).
    pub listener: ListenerConfig,

    /// Key vault storage backend.
    pub storage: StorageConfig,

    /// Upstream blockchain node.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration for idempotent upstream reads.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9900").
    pub bind_address: String,

    /// Maximum concurrently served requests (backpressure).
    pub max_connections: usize,

    /// Maximum request body size in bytes (after decompression).
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9900".to_string(),
            max_connections: 10_000,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Key vault backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

/// Key vault storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Database file (sqlite backend only).
    pub path: String,

    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            path: "vault.db".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Upstream node configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Primary JSON-RPC endpoint URL. Broadcasts only ever go here.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs, used for reads.
    pub failover_urls: Vec<String>,

    /// Expected chain id. Empty disables the comparison.
    pub chain_id: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Check the node's chain id at startup.
    pub verify_chain_id: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:16888/rpc".to_string(),
            failover_urls: Vec::new(),
            chain_id: String::new(),
            rpc_timeout_secs: 10,
            verify_chain_id: true,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline of one gateway call (resolve, sign, upstream) in seconds.
    pub call_secs: u64,

    /// HTTP request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_secs: 30,
            request_secs: 35,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts (rounds over all providers).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
