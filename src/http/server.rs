//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the RPC and health handlers
//! - Wire up middleware (tracing, limits, request ID, decompression)
//! - Carry the caller identity into the gateway
//! - Bind server to listener and drain on shutdown

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::Request,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    decompression::RequestDecompressionLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, VaultConfig};
use crate::gateway::GatewayHandler;
use crate::http::middleware::{caller_identity_middleware, CallerContext};
use crate::http::request::{RpcRequest, X_REQUEST_ID};
use crate::http::response::RpcReply;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<GatewayHandler>,
}

/// JSON-RPC server in front of the gateway.
pub struct HttpServer {
    router: Router,
    listener_config: ListenerConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &VaultConfig, handler: GatewayHandler) -> Self {
        let state = AppState {
            handler: Arc::new(handler),
        };
        let router = Self::build_router(config, state);
        Self {
            router,
            listener_config: config.listener.clone(),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &VaultConfig, state: AppState) -> Router {
        Router::new()
            .route("/rpc", post(rpc_handler))
            .route("/health", get(health_handler))
            .layer(middleware::from_fn(caller_identity_middleware))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(RequestDecompressionLayer::new())
            .layer(GlobalConcurrencyLimitLayer::new(
                config.listener.max_connections,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain in-flight calls.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_connections = self.listener_config.max_connections,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining in-flight calls");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// JSON-RPC endpoint.
async fn rpc_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    body: Bytes,
) -> impl IntoResponse {
    let request = match RpcRequest::from_slice(&body) {
        Ok(request) => request,
        Err(reply) => {
            tracing::debug!("Rejected malformed RPC request");
            return *reply;
        }
    };

    let id = request.id;
    match state
        .handler
        .dispatch(caller.user_id.as_deref(), &request.method, request.params)
        .await
    {
        Ok(result) => RpcReply::result(id, result),
        Err(e) => RpcReply::from_gateway_error(id, &e),
    }
}

/// Liveness check.
async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
