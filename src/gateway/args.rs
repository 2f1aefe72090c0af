//! Caller-facing argument and result shapes.
//!
//! Amounts, gas and sequence numbers are accepted either as JSON numbers or as decimal
//! strings, since the node itself reports them as strings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::blockchain::types::{Coin, TxOutput};
use crate::gateway::error::GatewayError;
use crate::vault::keys::Address;

/// Account lookup.
pub const GET_ACCOUNT: &str = "theta.GetAccount";
/// Value transfer.
pub const SEND: &str = "theta.Send";
/// Payment-channel reservation.
pub const RESERVE_FUND: &str = "theta.ReserveFund";
/// Source half of an off-chain payment.
pub const CREATE_SERVICE_PAYMENT: &str = "theta.CreateServicePayment";
/// Target counter-signature and broadcast of a payment.
pub const SUBMIT_SERVICE_PAYMENT: &str = "theta.SubmitServicePayment";

fn u64_from_value<E: serde::de::Error>(value: Value) -> Result<u64, E> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| E::custom(format!("{} is not an unsigned integer", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("'{}' is not an unsigned integer", s))),
        other => Err(E::custom(format!("expected integer, got {}", other))),
    }
}

pub(crate) fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    u64_from_value(Value::deserialize(deserializer)?)
}

pub(crate) fn de_opt_u64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => u64_from_value(value).map(Some),
    }
}

/// Amount of one denomination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinArg {
    pub denom: String,
    #[serde(deserialize_with = "de_u64")]
    pub amount: u64,
}

impl From<&CoinArg> for Coin {
    fn from(arg: &CoinArg) -> Self {
        Coin::new(arg.denom.clone(), arg.amount)
    }
}

fn coins(args: &[CoinArg]) -> Vec<Coin> {
    args.iter().map(Coin::from).collect()
}

fn parse_address(field: &str, value: &str) -> Result<Address, GatewayError> {
    value
        .parse()
        .map_err(|e| GatewayError::InvalidParams(format!("{}: {}", field, e)))
}

/// One recipient of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputArg {
    pub address: String,
    pub coins: Vec<CoinArg>,
}

impl OutputArg {
    pub fn to_output(&self) -> Result<TxOutput, GatewayError> {
        let address = parse_address("to.address", &self.address)?;
        Ok(TxOutput {
            address: address.as_bytes().to_vec(),
            coins: coins(&self.coins),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendArgs {
    pub to: Vec<OutputArg>,
    pub fee: CoinArg,
    #[serde(deserialize_with = "de_u64")]
    pub gas: u64,
    /// Omitted: next sequence of the caller's account.
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub sequence: Option<u64>,
}

impl SendArgs {
    pub fn outputs(&self) -> Result<Vec<TxOutput>, GatewayError> {
        self.to.iter().map(OutputArg::to_output).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveFundArgs {
    pub fund: Vec<CoinArg>,
    #[serde(default)]
    pub collateral: Vec<CoinArg>,
    pub resource_ids: Vec<String>,
    #[serde(deserialize_with = "de_u64")]
    pub duration: u64,
    pub fee: CoinArg,
    #[serde(deserialize_with = "de_u64")]
    pub gas: u64,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub sequence: Option<u64>,
}

impl ReserveFundArgs {
    pub fn fund_coins(&self) -> Vec<Coin> {
        coins(&self.fund)
    }

    pub fn collateral_coins(&self) -> Vec<Coin> {
        coins(&self.collateral)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServicePaymentArgs {
    /// Target account address.
    pub to: String,
    pub amount: Vec<CoinArg>,
    #[serde(deserialize_with = "de_u64")]
    pub payment_sequence: u64,
    #[serde(deserialize_with = "de_u64")]
    pub reserve_sequence: u64,
    pub resource_id: String,
    pub fee: CoinArg,
    #[serde(deserialize_with = "de_u64")]
    pub gas: u64,
}

impl CreateServicePaymentArgs {
    pub fn target(&self) -> Result<Address, GatewayError> {
        parse_address("to", &self.to)
    }

    pub fn amount_coins(&self) -> Vec<Coin> {
        coins(&self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitServicePaymentArgs {
    /// Hex voucher produced by `theta.CreateServicePayment`.
    pub payment: String,
    #[serde(default, deserialize_with = "de_opt_u64")]
    pub sequence: Option<u64>,
}

/// Commit result of a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(deserialize_with = "de_u64")]
    pub height: u64,
}

/// Source-signed payment voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePaymentResult {
    pub payment: String,
}

/// A decoded caller request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayRequest {
    GetAccount,
    Send(SendArgs),
    ReserveFund(ReserveFundArgs),
    CreateServicePayment(CreateServicePaymentArgs),
    SubmitServicePayment(SubmitServicePaymentArgs),
}

impl GatewayRequest {
    /// Decode `params` for `method`.
    ///
    /// `params` may be the argument object itself or a one-element array wrapping it.
    pub fn parse(method: &str, params: Value) -> Result<Self, GatewayError> {
        let params = unwrap_params(params);
        match method {
            GET_ACCOUNT => Ok(GatewayRequest::GetAccount),
            SEND => decode(params).map(GatewayRequest::Send),
            RESERVE_FUND => decode(params).map(GatewayRequest::ReserveFund),
            CREATE_SERVICE_PAYMENT => decode(params).map(GatewayRequest::CreateServicePayment),
            SUBMIT_SERVICE_PAYMENT => decode(params).map(GatewayRequest::SubmitServicePayment),
            other => Err(GatewayError::MethodNotFound(other.to_string())),
        }
    }
}

fn unwrap_params(params: Value) -> Value {
    match params {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

fn decode<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, GatewayError> {
    serde_json::from_value(params).map_err(|e| GatewayError::InvalidParams(e.to_string()))
}
