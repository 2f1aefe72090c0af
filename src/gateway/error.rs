//! Caller-facing error taxonomy.

use std::time::Duration;
use thiserror::Error;

use crate::blockchain::client::RpcError;
use crate::blockchain::types::{BlockchainError, SigningError};
use crate::resilience::DeadlineExceeded;
use crate::vault::error::VaultError;

/// JSON-RPC: the request object is not valid.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC: unknown method.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC: bad method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC: internal failure.
pub const INTERNAL_ERROR: i64 = -32603;
/// JSON-RPC: body is not JSON.
pub const PARSE_ERROR: i64 = -32700;

pub const UNAUTHENTICATED: i64 = -32001;
pub const STORAGE_ERROR: i64 = -32002;
pub const UPSTREAM_UNAVAILABLE: i64 = -32003;
pub const DEADLINE_EXCEEDED: i64 = -32004;
pub const SIGNING_REJECTED: i64 = -32005;

/// Everything a gateway call can fail with.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No caller identity on the call.
    #[error("unauthenticated: no caller identity")]
    Unauthenticated,

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Vault persistence failure (detail is for operators only).
    #[error("storage error: {0}")]
    Storage(String),

    /// Key provisioning failed (detail is for operators only).
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing rejected: {0}")]
    Signing(#[from] SigningError),

    /// Application error returned by the node, passed through verbatim.
    #[error("{code}: {message}")]
    Upstream { code: i64, message: String },

    /// The node could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// JSON-RPC error code reported to the caller.
    pub fn code(&self) -> i64 {
        match self {
            GatewayError::Unauthenticated => UNAUTHENTICATED,
            GatewayError::InvalidParams(_) => INVALID_PARAMS,
            GatewayError::MethodNotFound(_) => METHOD_NOT_FOUND,
            GatewayError::Storage(_) => STORAGE_ERROR,
            GatewayError::KeyGeneration(_) => INTERNAL_ERROR,
            GatewayError::Signing(_) => SIGNING_REJECTED,
            GatewayError::Upstream { code, .. } => *code,
            GatewayError::UpstreamUnavailable(_) => UPSTREAM_UNAVAILABLE,
            GatewayError::Timeout(_) => DEADLINE_EXCEEDED,
            GatewayError::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// Message reported to the caller. Internal detail is withheld.
    pub fn caller_message(&self) -> String {
        match self {
            GatewayError::Storage(_) => "storage unavailable".to_string(),
            GatewayError::KeyGeneration(_) | GatewayError::Internal(_) => {
                "internal error".to_string()
            }
            GatewayError::Upstream { message, .. } => message.clone(),
            GatewayError::UpstreamUnavailable(_) => "upstream node unavailable".to_string(),
            other => other.to_string(),
        }
    }

    /// Metric label for the failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            GatewayError::Unauthenticated => "unauthenticated",
            GatewayError::InvalidParams(_) | GatewayError::MethodNotFound(_) => "bad_request",
            GatewayError::Storage(_) | GatewayError::KeyGeneration(_) => "vault_error",
            GatewayError::Signing(_) => "signing_error",
            GatewayError::Upstream { .. } => "upstream_error",
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl From<VaultError> for GatewayError {
    fn from(e: VaultError) -> Self {
        match e {
            VaultError::KeyGeneration(reason) => GatewayError::KeyGeneration(reason),
            other => GatewayError::Storage(other.to_string()),
        }
    }
}

impl From<BlockchainError> for GatewayError {
    fn from(e: BlockchainError) -> Self {
        GatewayError::UpstreamUnavailable(e.to_string())
    }
}

impl From<RpcError> for GatewayError {
    fn from(e: RpcError) -> Self {
        GatewayError::Upstream {
            code: e.code,
            message: e.message,
        }
    }
}

impl From<DeadlineExceeded> for GatewayError {
    fn from(e: DeadlineExceeded) -> Self {
        GatewayError::Timeout(e.0)
    }
}
