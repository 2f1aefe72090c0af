//! Ledger wire messages and error definitions.
//!
//! Messages are protobuf (proto3) encoded with `prost`. Field tags are part of the
//! signing contract: changing any of them changes the sign-bytes and invalidates
//! every signature the upstream node would otherwise accept.

use prost::{Message, Oneof};
use std::fmt;
use thiserror::Error;

/// Chain identifier reported by the upstream node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainId(pub String);

impl From<&str> for ChainId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ChainId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors that can occur while talking to the upstream node.
///
/// These are transport failures. Application errors returned by the node are carried in
/// the RPC response itself and never converted into this type.
#[derive(Debug, Error)]
pub enum BlockchainError {
    /// Connection or HTTP-level failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// The node answered with something that is not a JSON-RPC response.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: String, actual: String },
}

/// Result type for blockchain operations.
pub type BlockchainResult<T> = Result<T, BlockchainError>;

/// Errors raised while building or signing a transaction.
#[derive(Debug, Error)]
pub enum SigningError {
    /// No input slot of the transaction belongs to the signing key.
    #[error("signer {address} is not authorized for any input of this transaction")]
    SignerNotAuthorized { address: String },

    /// Transaction is structurally invalid.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// Key pair handed to the signer is inconsistent.
    #[error("private key does not match the signing public key")]
    KeyMismatch,

    /// Wire bytes could not be decoded.
    #[error("transaction decoding failed: {0}")]
    Decode(String),
}

// ─── Wire messages ───────────────────────────────────────────────────────────

/// An amount of one denomination.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(uint64, tag = "2")]
    pub amount: u64,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u64) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct SignatureMsg {
    #[prost(bytes = "vec", tag = "2")]
    pub ed25519: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct PubKeyMsg {
    #[prost(bytes = "vec", tag = "2")]
    pub ed25519: Vec<u8>,
}

/// A signer slot: the account spending `coins` at `sequence`.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct TxInput {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub coins: Vec<Coin>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
    #[prost(message, optional, tag = "4")]
    pub signature: Option<SignatureMsg>,
    #[prost(message, optional, tag = "5")]
    pub pub_key: Option<PubKeyMsg>,
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct TxOutput {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
    #[prost(message, repeated, tag = "2")]
    pub coins: Vec<Coin>,
}

/// Value transfer.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct SendTx {
    #[prost(uint64, tag = "1")]
    pub gas: u64,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Coin>,
    #[prost(message, repeated, tag = "3")]
    pub inputs: Vec<TxInput>,
    #[prost(message, repeated, tag = "4")]
    pub outputs: Vec<TxOutput>,
}

/// Locks a payment-channel fund plus collateral for a set of resources.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct ReserveFundTx {
    #[prost(uint64, tag = "1")]
    pub gas: u64,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Coin>,
    #[prost(message, optional, tag = "3")]
    pub source: Option<TxInput>,
    #[prost(message, repeated, tag = "4")]
    pub collateral: Vec<Coin>,
    #[prost(string, repeated, tag = "5")]
    pub resource_ids: Vec<String>,
    #[prost(uint64, tag = "6")]
    pub duration: u64,
}

/// Off-chain payment voucher, signed by the source and later counter-signed by the
/// target when it is submitted.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct ServicePaymentTx {
    #[prost(uint64, tag = "1")]
    pub gas: u64,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Coin>,
    #[prost(message, optional, tag = "3")]
    pub source: Option<TxInput>,
    #[prost(message, optional, tag = "4")]
    pub target: Option<TxInput>,
    #[prost(uint64, tag = "5")]
    pub payment_sequence: u64,
    #[prost(uint64, tag = "6")]
    pub reserve_sequence: u64,
    #[prost(string, tag = "7")]
    pub resource_id: String,
}

/// Transaction envelope.
#[derive(Clone, PartialEq, Eq, Message)]
pub struct Tx {
    #[prost(oneof = "TxKind", tags = "2, 3, 5")]
    pub kind: Option<TxKind>,
}

#[derive(Clone, PartialEq, Eq, Oneof)]
pub enum TxKind {
    #[prost(message, tag = "2")]
    Send(SendTx),
    #[prost(message, tag = "3")]
    ReserveFund(ReserveFundTx),
    #[prost(message, tag = "5")]
    ServicePayment(ServicePaymentTx),
}

impl TxKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            TxKind::Send(_) => "send",
            TxKind::ReserveFund(_) => "reserve_fund",
            TxKind::ServicePayment(_) => "service_payment",
        }
    }
}
