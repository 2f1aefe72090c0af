//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! caller arguments + KeyRecord
//!     → transaction.rs (build unsigned tx, sign-bytes per signer slot)
//!     → signer.rs (Ed25519 signature, attach, encode)
//!     → client.rs (JSON-RPC to the node with timeouts)
//! ```
//!
//! # Security Constraints
//! - Private keys arrive only inside vault records, for the duration of one call
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the node is unreachable at startup

pub mod client;
pub mod signer;
pub mod transaction;
pub mod types;

pub use client::{HttpRpcClient, RpcError, RpcResponse, UpstreamClient};
pub use signer::{sign, Ed25519Signer, TransactionSigner};
pub use types::{BlockchainError, ChainId, SigningError, Tx};
