//! HTTP transport subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit, gzip, concurrency cap)
//!     → middleware/ (caller identity from X-Auth-User)
//!     → request.rs (parse JSON-RPC envelope)
//!     → gateway::GatewayHandler::dispatch
//!     → response.rs (JSON-RPC reply)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::CallerContext;
pub use request::{RpcRequest, X_AUTH_USER, X_REQUEST_ID};
pub use response::{RpcReply, RpcReplyError};
pub use server::{AppState, HttpServer};
