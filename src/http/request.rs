//! Inbound JSON-RPC request handling.
//!
//! # Responsibilities
//! - Parse the JSON-RPC 2.0 request envelope
//! - Report malformed bodies with the standard parse / invalid-request codes
//! - Expose the request id header used for correlation
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (see server.rs layers)
//! - Batches are not supported; a JSON array body is an invalid request

use serde::Deserialize;
use serde_json::Value;

use crate::gateway::error::{INVALID_REQUEST, PARSE_ERROR};
use crate::http::response::RpcReply;

/// Correlation header set on every request and echoed on every response.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Header carrying the caller identity established by the auth layer.
pub const X_AUTH_USER: &str = "x-auth-user";

/// A single JSON-RPC call.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub id: Value,
}

impl RpcRequest {
    /// Parse a request body, or produce the error reply to send instead.
    pub fn from_slice(body: &[u8]) -> Result<Self, Box<RpcReply>> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| Box::new(RpcReply::error(Value::Null, PARSE_ERROR, e.to_string())))?;

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        if !value.is_object() {
            return Err(Box::new(RpcReply::error(
                id,
                INVALID_REQUEST,
                "request must be a JSON object",
            )));
        }

        let request: RpcRequest = serde_json::from_value(value)
            .map_err(|e| Box::new(RpcReply::error(id.clone(), INVALID_REQUEST, e.to_string())))?;

        if let Some(version) = &request.jsonrpc {
            if version != "2.0" {
                return Err(Box::new(RpcReply::error(
                    id,
                    INVALID_REQUEST,
                    format!("unsupported jsonrpc version '{}'", version),
                )));
            }
        }
        Ok(request)
    }
}
