//! JSON-RPC over HTTP, from caller to a mock node.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vault_gateway::blockchain::HttpRpcClient;
use vault_gateway::config::VaultConfig;
use vault_gateway::gateway::GatewayHandler;
use vault_gateway::http::HttpServer;
use vault_gateway::lifecycle::Shutdown;
use vault_gateway::resilience::RetryPolicy;

mod common;
use common::{FIXTURE_RECIPIENT, SIGNED_FIXTURE};

struct Gateway {
    addr: SocketAddr,
    shutdown: Shutdown,
    task: JoinHandle<Result<(), std::io::Error>>,
}

impl Gateway {
    fn rpc_url(&self) -> String {
        format!("http://{}/rpc", self.addr)
    }
}

async fn start_gateway(node: &MockServer, configure: impl FnOnce(&mut VaultConfig)) -> Gateway {
    let mut config = VaultConfig::default();
    config.upstream.rpc_url = format!("{}/rpc", node.uri());
    config.upstream.rpc_timeout_secs = 2;
    configure(&mut config);

    let vault = common::seeded_vault(&[common::fixture_record("alice")]).await;
    let upstream = HttpRpcClient::new(config.upstream.clone(), RetryPolicy::none()).unwrap();
    let handler = GatewayHandler::new(vault, Arc::new(upstream), Duration::from_secs(5));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config, handler);
    let task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    Gateway { addr, shutdown, task }
}

async fn call(gateway: &Gateway, user: Option<&str>, body: Value) -> (reqwest::StatusCode, reqwest::header::HeaderMap, Value) {
    let mut request = reqwest::Client::new().post(gateway.rpc_url()).json(&body);
    if let Some(user) = user {
        request = request.header("X-Auth-User", user);
    }
    let response = request.send().await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    (status, headers, response.json().await.unwrap())
}

fn fixture_send(id: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "theta.Send",
        "params": [{
            "to": [{"address": FIXTURE_RECIPIENT, "coins": [{"denom": "ThetaWei", "amount": "123"}]}],
            "fee": {"denom": "GammaWei", "amount": "4"},
            "gas": "5",
            "sequence": "1"
        }],
        "id": id
    })
}

#[tokio::test]
async fn test_send_reaches_node_with_fixture_bytes() {
    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "theta.BroadcastRawTransaction",
            "params": {"tx_bytes": SIGNED_FIXTURE}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"hash": "0x5a1e", "block": {}, "height": "9"}
        })))
        .expect(1)
        .mount(&node)
        .await;

    let gateway = start_gateway(&node, |_| {}).await;
    let (status, headers, reply) = call(&gateway, Some("alice"), fixture_send(11)).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(
        reply,
        json!({"jsonrpc": "2.0", "result": {"hash": "0x5a1e", "height": 9}, "id": 11})
    );
}

#[tokio::test]
async fn test_node_error_reaches_caller_verbatim() {
    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 3000, "message": "Failed."}
        })))
        .mount(&node)
        .await;

    let gateway = start_gateway(&node, |_| {}).await;
    let (_, _, reply) = call(&gateway, Some("alice"), fixture_send(2)).await;

    assert_eq!(reply["error"], json!({"code": 3000, "message": "Failed."}));
    assert_eq!(reply["id"], 2);
    assert!(reply.get("result").is_none());
}

#[tokio::test]
async fn test_missing_identity_never_reaches_node() {
    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&node)
        .await;

    let gateway = start_gateway(&node, |_| {}).await;
    let (status, _, reply) = call(&gateway, None, fixture_send(3)).await;

    assert_eq!(status, reqwest::StatusCode::OK);
    assert_eq!(reply["error"]["code"], -32001);
}

#[tokio::test]
async fn test_unreachable_node_is_upstream_unavailable() {
    let node = MockServer::start().await;
    let gateway = start_gateway(&node, |config| {
        config.upstream.rpc_url = "http://127.0.0.1:1/rpc".to_string();
    })
    .await;

    let (_, _, reply) = call(&gateway, Some("alice"), fixture_send(4)).await;
    assert_eq!(reply["error"]["code"], -32003);
    assert_eq!(reply["error"]["message"], "upstream node unavailable");
}

#[tokio::test]
async fn test_malformed_envelopes() {
    let node = MockServer::start().await;
    let gateway = start_gateway(&node, |_| {}).await;
    let client = reqwest::Client::new();

    let reply: Value = client
        .post(gateway.rpc_url())
        .header("X-Auth-User", "alice")
        .header("content-type", "application/json")
        .body("{\"jsonrpc\": \"2.0\",")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["error"]["code"], -32700);
    assert_eq!(reply["id"], Value::Null);

    let (_, _, reply) = call(&gateway, Some("alice"), json!({"jsonrpc": "2.0", "id": 5})).await;
    assert_eq!(reply["error"]["code"], -32600);

    let (_, _, reply) = call(
        &gateway,
        Some("alice"),
        json!({"jsonrpc": "2.0", "method": "theta.Nope", "params": [], "id": 6}),
    )
    .await;
    assert_eq!(reply["error"]["code"], -32601);
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let node = MockServer::start().await;
    let gateway = start_gateway(&node, |config| config.listener.max_body_size = 64).await;

    let response = reqwest::Client::new()
        .post(gateway.rpc_url())
        .header("X-Auth-User", "alice")
        .json(&fixture_send(7))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_health_and_graceful_shutdown() {
    let node = MockServer::start().await;
    let gateway = start_gateway(&node, |_| {}).await;

    let health: Value = reqwest::get(format!("http://{}/health", gateway.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    gateway.shutdown.trigger();
    let stopped = tokio::time::timeout(Duration::from_secs(5), gateway.task)
        .await
        .expect("server did not stop");
    assert!(stopped.unwrap().is_ok());
}
