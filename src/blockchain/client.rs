//! Upstream node JSON-RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Send JSON-RPC 2.0 requests to the node over HTTP
//! - Fail over between providers and retry idempotent reads
//! - Keep node application errors intact for the caller
//! - Provide chain-id verification and a health check
//!
//! # Design Decisions
//! - The gateway depends on the [`UpstreamClient`] trait, never on the HTTP client,
//!   so the handler can be driven by a scripted transport in tests
//! - Broadcasts go to the primary provider exactly once: a timed-out broadcast may
//!   still commit, so replaying it elsewhere is unsafe

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::blockchain::types::{BlockchainError, BlockchainResult, ChainId};
use crate::config::schema::UpstreamConfig;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Account lookup.
pub const METHOD_GET_ACCOUNT: &str = "theta.GetAccount";
/// Signed transaction submission.
pub const METHOD_BROADCAST_RAW_TRANSACTION: &str = "theta.BroadcastRawTransaction";
/// Node status (carries the chain id).
pub const METHOD_GET_STATUS: &str = "theta.GetStatus";

/// Application-level error object returned by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A JSON-RPC response: either a result or an application error.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(result: Value) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(code: i64, message: impl Into<String>) -> Self {
        Self {
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// The result value, or the node's error. A missing result reads as `null`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

/// Transport to the upstream node.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Invoke `method` with `params`.
    ///
    /// `Err` means the node could not be reached or answered garbage. A node-side
    /// failure is an `Ok` response carrying an [`RpcError`].
    async fn call(&self, method: &str, params: Value) -> BlockchainResult<RpcResponse>;
}

/// JSON-RPC over HTTP with failover support.
pub struct HttpRpcClient {
    http: reqwest::Client,
    /// List of providers (primary + failovers).
    providers: Vec<url::Url>,
    config: UpstreamConfig,
    retry: RetryPolicy,
    timeout_duration: Duration,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a new client. Does not contact the node.
    pub fn new(config: UpstreamConfig, retry: RetryPolicy) -> BlockchainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        // 1. Primary provider
        let primary: url::Url = config.rpc_url.parse().map_err(|e| {
            BlockchainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let mut providers = vec![primary];

        // 2. Failover providers
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => providers.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| BlockchainError::Rpc(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            providers,
            config,
            retry,
            timeout_duration,
            next_id: AtomicU64::new(1),
        })
    }

    /// Providers eligible for `method`.
    fn providers_for(&self, method: &str) -> &[url::Url] {
        if crate::resilience::is_idempotent(method) {
            &self.providers
        } else {
            &self.providers[..1]
        }
    }

    async fn call_provider(
        &self,
        url: &url::Url,
        method: &str,
        params: &Value,
    ) -> BlockchainResult<RpcResponse> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;

        match serde_json::from_slice::<RpcResponse>(&bytes) {
            Ok(parsed) if parsed.result.is_some() || parsed.error.is_some() => Ok(parsed),
            Ok(_) | Err(_) if !status.is_success() => {
                Err(BlockchainError::Rpc(format!("HTTP status {}", status)))
            }
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(BlockchainError::InvalidResponse(e.to_string())),
        }
    }

    /// Fetch the chain id reported by the node.
    pub async fn get_chain_id(&self) -> BlockchainResult<ChainId> {
        let status = self
            .call(METHOD_GET_STATUS, json!({}))
            .await?
            .into_result()
            .map_err(|e| BlockchainError::Rpc(e.to_string()))?;

        status
            .get("chain_id")
            .and_then(Value::as_str)
            .map(ChainId::from)
            .ok_or_else(|| {
                BlockchainError::InvalidResponse("status carries no chain_id".to_string())
            })
    }

    /// Verify the connected chain id matches configuration.
    ///
    /// An empty configured chain id accepts any node.
    pub async fn verify_chain_id(&self) -> BlockchainResult<ChainId> {
        let chain_id = self.get_chain_id().await?;
        if !self.config.chain_id.is_empty() && chain_id.0 != self.config.chain_id {
            return Err(BlockchainError::ChainMismatch {
                expected: self.config.chain_id.clone(),
                actual: chain_id.0,
            });
        }
        Ok(chain_id)
    }

    /// Check if the node is reachable and healthy.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.get_chain_id().await.is_ok();
        metrics::record_upstream_health(healthy);
        healthy
    }

    /// Re-check node health every `every` until `shutdown` fires.
    pub fn spawn_health_monitor(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        if !self.is_healthy().await {
                            tracing::warn!("Upstream node unreachable");
                        }
                    }
                }
            }
            tracing::debug!("Upstream health monitor stopped");
        })
    }
}

#[async_trait]
impl UpstreamClient for HttpRpcClient {
    async fn call(&self, method: &str, params: Value) -> BlockchainResult<RpcResponse> {
        let providers = self.providers_for(method);
        let attempts = self.retry.attempts_for(method);
        let mut last_error = BlockchainError::Rpc("All RPC providers failed".to_string());

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry.delay(attempt);
                tracing::debug!(method, attempt, delay_ms = delay.as_millis() as u64, "Retrying upstream call");
                tokio::time::sleep(delay).await;
            }

            for (i, url) in providers.iter().enumerate() {
                match timeout(self.timeout_duration, self.call_provider(url, method, &params)).await
                {
                    Ok(Ok(response)) => {
                        let outcome = if response.error.is_some() { "rpc_error" } else { "ok" };
                        metrics::record_upstream_call(method, outcome);
                        return Ok(response);
                    }
                    Ok(Err(e)) => {
                        metrics::record_upstream_call(method, "transport_error");
                        tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                        last_error = e;
                    }
                    Err(_) => {
                        metrics::record_upstream_call(method, "timeout");
                        tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                        last_error = BlockchainError::Timeout(self.config.rpc_timeout_secs);
                    }
                }
            }
        }

        Err(last_error)
    }
}

impl std::fmt::Debug for HttpRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRpcClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("providers", &self.providers.len())
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(url: String) -> UpstreamConfig {
        UpstreamConfig {
            rpc_url: url,
            failover_urls: Vec::new(),
            chain_id: "privatenet".to_string(),
            rpc_timeout_secs: 2,
            verify_chain_id: true,
        }
    }

    fn fast_retries() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 2,
        }
    }

    #[test]
    fn test_invalid_primary_url() {
        let result = HttpRpcClient::new(test_config("not a url".into()), RetryPolicy::none());
        assert!(matches!(result, Err(BlockchainError::Rpc(_))));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(
            RpcResponse::success(json!({"height": 1})).into_result().unwrap(),
            json!({"height": 1})
        );
        let err = RpcResponse::failure(3000, "Failed.").into_result().unwrap_err();
        assert_eq!(err.to_string(), "3000: Failed.");
    }

    #[tokio::test]
    async fn test_rpc_error_is_returned_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": 3000, "message": "Failed."}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            HttpRpcClient::new(test_config(format!("{}/rpc", server.uri())), fast_retries()).unwrap();
        let response = client
            .call(METHOD_GET_ACCOUNT, json!({"address": "00"}))
            .await
            .unwrap();

        let error = response.error.unwrap();
        assert_eq!(error.code, 3000);
        assert_eq!(error.message, "Failed.");
    }

    #[tokio::test]
    async fn test_read_fails_over_to_secondary() {
        let primary = MockServer::start().await;
        let secondary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "theta.GetAccount"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"sequence": "4"}
            })))
            .mount(&secondary)
            .await;

        let mut config = test_config(primary.uri());
        config.failover_urls.push(secondary.uri());
        let client = HttpRpcClient::new(config, RetryPolicy::none()).unwrap();

        let result = client
            .call(METHOD_GET_ACCOUNT, json!({"address": "00"}))
            .await
            .unwrap()
            .into_result()
            .unwrap();
        assert_eq!(result["sequence"], "4");
    }

    #[tokio::test]
    async fn test_broadcast_is_sent_once_to_primary() {
        let primary = MockServer::start().await;
        let secondary = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&primary)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&secondary)
            .await;

        let mut config = test_config(primary.uri());
        config.failover_urls.push(secondary.uri());
        let client = HttpRpcClient::new(config, fast_retries()).unwrap();

        let result = client
            .call(METHOD_BROADCAST_RAW_TRANSACTION, json!({"tx_bytes": "00"}))
            .await;
        assert!(matches!(result, Err(BlockchainError::Rpc(_))));
    }

    #[tokio::test]
    async fn test_read_retries_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = HttpRpcClient::new(test_config(server.uri()), fast_retries()).unwrap();
        let result = client.call(METHOD_GET_STATUS, json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_verify_chain_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "theta.GetStatus"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"chain_id": "testnet", "latest_finalized_block_height": "10"}
            })))
            .mount(&server)
            .await;

        let client = HttpRpcClient::new(test_config(server.uri()), RetryPolicy::none()).unwrap();
        assert_eq!(client.get_chain_id().await.unwrap(), ChainId::from("testnet"));
        assert!(matches!(
            client.verify_chain_id().await,
            Err(BlockchainError::ChainMismatch { .. })
        ));
        assert!(client.is_healthy().await);
    }

    #[tokio::test]
    async fn test_health_monitor_runs_until_shutdown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "theta.GetStatus"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"chain_id": "testnet", "latest_finalized_block_height": "10"}
            })))
            .mount(&server)
            .await;

        let client = Arc::new(
            HttpRpcClient::new(test_config(server.uri()), RetryPolicy::none()).unwrap(),
        );
        let shutdown = crate::lifecycle::Shutdown::new();
        let monitor = client.spawn_health_monitor(Duration::from_millis(20), shutdown.subscribe());

        tokio::time::sleep(Duration::from_millis(150)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), monitor)
            .await
            .expect("monitor stops on shutdown")
            .unwrap();

        let checks = server.received_requests().await.unwrap().len();
        assert!(checks >= 2, "expected repeated checks, got {checks}");
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), checks);
    }
}
