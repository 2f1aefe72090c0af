//! Per-call gateway logic.
//!
//! # Data Flow
//! ```text
//! dispatch(caller, method, params)
//!     → identify caller                (Unauthenticated)
//!     → parse method + params          (InvalidParams / MethodNotFound)
//!     → KeyVault::get_or_create        (Storage / KeyGeneration)
//!     → read:  upstream query with the record's address
//!     → write: build tx → sign → theta.BroadcastRawTransaction
//!     → map result or error
//! ```
//! The whole chain runs under one deadline. Nothing after the vault step touches
//! vault state, so a failed signature or upstream call never alters a record.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::blockchain::client::{
    UpstreamClient, METHOD_BROADCAST_RAW_TRANSACTION, METHOD_GET_ACCOUNT,
};
use crate::blockchain::signer::{Ed25519Signer, TransactionSigner};
use crate::blockchain::transaction::{
    build_reserve_fund, build_send, build_service_payment, prepare_target, ReserveFundParams,
    SendParams, ServicePaymentParams, SOURCE_SLOT,
};
use crate::blockchain::types::Tx;
use crate::gateway::args::{
    de_u64, BroadcastResult, CreateServicePaymentArgs, GatewayRequest, ReserveFundArgs,
    SendArgs, ServicePaymentResult, SubmitServicePaymentArgs,
};
use crate::gateway::error::GatewayError;
use crate::observability::metrics;
use crate::resilience::with_deadline;
use crate::vault::keys::Address;
use crate::vault::record::KeyRecord;
use crate::vault::store::KeyVault;

/// Default deadline of one gateway call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves caller RPC methods on top of the vault, the signer and the upstream node.
///
/// Holds no per-user or per-channel state between calls.
#[derive(Clone)]
pub struct GatewayHandler {
    vault: Arc<dyn KeyVault>,
    upstream: Arc<dyn UpstreamClient>,
    signer: Arc<dyn TransactionSigner>,
    call_timeout: Duration,
}

impl GatewayHandler {
    pub fn new(
        vault: Arc<dyn KeyVault>,
        upstream: Arc<dyn UpstreamClient>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            vault,
            upstream,
            signer: Arc::new(Ed25519Signer),
            call_timeout,
        }
    }

    /// Replace the signer.
    pub fn with_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        self.signer = signer;
        self
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Serve one caller RPC call.
    ///
    /// `caller` is the identity established by the external auth layer.
    pub async fn dispatch(
        &self,
        caller: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, GatewayError> {
        let start = Instant::now();
        let result = match with_deadline(self.call_timeout, self.serve(caller, method, params)).await
        {
            Ok(result) => result,
            Err(elapsed) => Err(GatewayError::from(elapsed)),
        };

        match &result {
            Ok(_) => {
                metrics::record_call(method, "ok", start);
                tracing::debug!(
                    method,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Gateway call completed"
                );
            }
            Err(e) => {
                metrics::record_call(method, e.outcome(), start);
                match e {
                    GatewayError::Storage(_)
                    | GatewayError::KeyGeneration(_)
                    | GatewayError::UpstreamUnavailable(_)
                    | GatewayError::Timeout(_)
                    | GatewayError::Internal(_) => {
                        tracing::error!(method, error = %e, "Gateway call failed")
                    }
                    _ => tracing::info!(method, error = %e, "Gateway call rejected"),
                }
            }
        }
        result
    }

    async fn serve(
        &self,
        caller: Option<&str>,
        method: &str,
        params: Value,
    ) -> Result<Value, GatewayError> {
        let user_id = identify(caller)?;
        let request = GatewayRequest::parse(method, params)?;

        match request {
            GatewayRequest::GetAccount => self.get_account(user_id).await,
            GatewayRequest::Send(args) => to_value(self.send(user_id, args).await?),
            GatewayRequest::ReserveFund(args) => to_value(self.reserve_fund(user_id, args).await?),
            GatewayRequest::CreateServicePayment(args) => {
                to_value(self.create_service_payment(user_id, args).await?)
            }
            GatewayRequest::SubmitServicePayment(args) => {
                to_value(self.submit_service_payment(user_id, args).await?)
            }
        }
    }

    /// Account state of the caller, straight from the node.
    pub async fn get_account(&self, user_id: &str) -> Result<Value, GatewayError> {
        let record = self.resolve(user_id).await?;
        self.query_account(&record.address).await
    }

    /// Sign and broadcast a transfer from the caller's account.
    pub async fn send(&self, user_id: &str, args: SendArgs) -> Result<BroadcastResult, GatewayError> {
        let record = self.resolve(user_id).await?;
        let outputs = args.outputs()?;
        let sequence = self.sequence_or_next(&record, args.sequence).await?;

        let tx = build_send(
            &record.public_key,
            SendParams {
                outputs,
                fee: (&args.fee).into(),
                gas: args.gas,
                sequence,
            },
        )?;
        self.sign_and_broadcast(&record, &tx).await
    }

    /// Sign and broadcast a payment-channel reservation.
    pub async fn reserve_fund(
        &self,
        user_id: &str,
        args: ReserveFundArgs,
    ) -> Result<BroadcastResult, GatewayError> {
        let record = self.resolve(user_id).await?;
        let sequence = self.sequence_or_next(&record, args.sequence).await?;

        let tx = build_reserve_fund(
            &record.public_key,
            ReserveFundParams {
                fund: args.fund_coins(),
                collateral: args.collateral_coins(),
                resource_ids: args.resource_ids,
                duration: args.duration,
                fee: (&args.fee).into(),
                gas: args.gas,
                sequence,
            },
        )?;
        self.sign_and_broadcast(&record, &tx).await
    }

    /// Sign the source half of a service payment and hand back the voucher.
    ///
    /// Nothing is sent upstream: the target submits the voucher later.
    pub async fn create_service_payment(
        &self,
        user_id: &str,
        args: CreateServicePaymentArgs,
    ) -> Result<ServicePaymentResult, GatewayError> {
        let record = self.resolve(user_id).await?;
        let target = args.target()?;

        let tx = build_service_payment(
            &record.public_key,
            ServicePaymentParams {
                target,
                amount: args.amount_coins(),
                payment_sequence: args.payment_sequence,
                reserve_sequence: args.reserve_sequence,
                resource_id: args.resource_id.clone(),
                fee: (&args.fee).into(),
                gas: args.gas,
            },
        )?;
        let signed = self.signer.sign(&record, &tx)?;

        tracing::info!(
            user_id = %user_id,
            source = %record.address,
            target = %target,
            payment_sequence = args.payment_sequence,
            "Service payment voucher signed"
        );

        Ok(ServicePaymentResult {
            payment: hex::encode(signed),
        })
    }

    /// Counter-sign a voucher addressed to the caller and broadcast it.
    pub async fn submit_service_payment(
        &self,
        user_id: &str,
        args: SubmitServicePaymentArgs,
    ) -> Result<BroadcastResult, GatewayError> {
        let record = self.resolve(user_id).await?;

        let bytes = hex::decode(args.payment.trim_start_matches("0x"))
            .map_err(|e| GatewayError::InvalidParams(format!("payment: {}", e)))?;
        let mut tx = Tx::from_bytes(&bytes)?;

        let source_signed = tx
            .inputs()
            .get(SOURCE_SLOT)
            .and_then(|input| input.signature.as_ref())
            .is_some_and(|s| !s.ed25519.is_empty());
        if !source_signed {
            return Err(GatewayError::InvalidParams(
                "payment is not signed by its source".to_string(),
            ));
        }

        let sequence = self.sequence_or_next(&record, args.sequence).await?;
        prepare_target(&mut tx, &record.public_key, sequence)?;
        self.sign_and_broadcast(&record, &tx).await
    }

    async fn resolve(&self, user_id: &str) -> Result<KeyRecord, GatewayError> {
        self.vault.get_or_create(user_id).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Key vault lookup failed");
            GatewayError::from(e)
        })
    }

    async fn upstream_call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let response = self.upstream.call(method, params).await?;
        response.into_result().map_err(|e| {
            tracing::info!(method, code = e.code, message = %e.message, "Upstream returned error");
            GatewayError::from(e)
        })
    }

    async fn query_account(&self, address: &Address) -> Result<Value, GatewayError> {
        self.upstream_call(METHOD_GET_ACCOUNT, json!({ "address": address.to_hex() }))
            .await
    }

    /// `requested` verbatim, or the account's current sequence + 1.
    async fn sequence_or_next(
        &self,
        record: &KeyRecord,
        requested: Option<u64>,
    ) -> Result<u64, GatewayError> {
        if let Some(sequence) = requested {
            return Ok(sequence);
        }

        let account = self.query_account(&record.address).await?;
        let current = account
            .get("sequence")
            .cloned()
            .ok_or_else(|| {
                GatewayError::UpstreamUnavailable("account carries no sequence".to_string())
            })
            .and_then(|value| {
                de_u64(value).map_err(|e: serde_json::Error| {
                    GatewayError::UpstreamUnavailable(format!("account sequence: {}", e))
                })
            })?;

        current.checked_add(1).ok_or_else(|| {
            GatewayError::UpstreamUnavailable("account sequence overflow".to_string())
        })
    }

    async fn sign_and_broadcast(
        &self,
        record: &KeyRecord,
        tx: &Tx,
    ) -> Result<BroadcastResult, GatewayError> {
        let signed = self.signer.sign(record, tx)?;

        tracing::info!(
            user_id = %record.user_id,
            address = %record.address,
            kind = tx.kind_name(),
            size = signed.len(),
            "Broadcasting signed transaction"
        );

        let result = self
            .upstream_call(
                METHOD_BROADCAST_RAW_TRANSACTION,
                json!({ "tx_bytes": hex::encode(&signed) }),
            )
            .await?;

        serde_json::from_value(result).map_err(|e| {
            GatewayError::UpstreamUnavailable(format!("unexpected broadcast result: {}", e))
        })
    }
}

/// The caller's user id, if the auth layer supplied a usable one.
fn identify(caller: Option<&str>) -> Result<&str, GatewayError> {
    match caller.map(str::trim) {
        Some(user_id) if !user_id.is_empty() => Ok(user_id),
        _ => Err(GatewayError::Unauthenticated),
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, GatewayError> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::Internal(format!("result encoding: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify() {
        assert_eq!(identify(Some("alice")).unwrap(), "alice");
        assert_eq!(identify(Some("  bob ")).unwrap(), "bob");
        assert!(matches!(identify(None), Err(GatewayError::Unauthenticated)));
        assert!(matches!(identify(Some("   ")), Err(GatewayError::Unauthenticated)));
    }
}
