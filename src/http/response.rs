//! Outbound JSON-RPC replies.
//!
//! Replies always travel with HTTP 200; the outcome is in the envelope.

use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::gateway::error::GatewayError;

/// Error object of a reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcReplyError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC 2.0 reply envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcReply {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcReplyError>,
    pub id: Value,
}

impl RpcReply {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcReplyError {
                code,
                message: message.into(),
            }),
            id,
        }
    }

    /// Reply for a failed gateway call, with internal detail withheld.
    pub fn from_gateway_error(id: Value, error: &GatewayError) -> Self {
        Self::error(id, error.code(), error.caller_message())
    }
}

impl IntoResponse for RpcReply {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
