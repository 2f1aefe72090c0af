//! Transaction-signing gateway.
//!
//! # Responsibilities
//! - Resolve the caller's key record (provisioning it on first access)
//! - Pass account queries through to the node
//! - Build, sign and broadcast write operations
//! - Translate results and errors into the caller-facing taxonomy
//!
//! # Design Decisions
//! - Vault, upstream transport and signer are injected as trait objects
//! - No session state: payment-channel state travels in arguments and results
//! - Upstream application errors are passed through with their original code
//! - A sequence conflict reported upstream is surfaced, never retried with a bumped
//!   sequence

pub mod args;
pub mod error;
pub mod handler;

pub use args::{BroadcastResult, GatewayRequest, ServicePaymentResult};
pub use error::GatewayError;
pub use handler::GatewayHandler;
