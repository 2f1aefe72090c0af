//! Transaction building and sign-bytes.
//!
//! # Responsibilities
//! - Build unsigned send / reserve-fund / service-payment transactions
//! - Enumerate signer slots (inputs) of any transaction kind
//! - Produce the canonical sign-bytes of a slot and attach signatures
//!
//! # Sign-bytes
//! ```text
//! send, reserve_fund     every slot's signature → empty SignatureMsg, encode envelope
//! service_payment source source {address, coins} + target {address}, no fee, no gas
//! service_payment target target signature → empty SignatureMsg (source signature kept)
//! ```
//! Encoding is deterministic: prost emits fields in tag order and skips defaults, so
//! the same logical transaction always yields identical bytes.

use prost::Message;
use std::collections::BTreeMap;

use crate::blockchain::types::{
    Coin, ReserveFundTx, SendTx, ServicePaymentTx, SignatureMsg, SigningError, Tx, TxInput,
    TxKind, TxOutput,
};
use crate::vault::keys::{Address, PublicKey, SIGNATURE_LEN};

/// Native token denomination.
pub const THETA_WEI: &str = "ThetaWei";

/// Gas token denomination.
pub const GAMMA_WEI: &str = "GammaWei";

/// Slot index of the source in a service payment.
pub const SOURCE_SLOT: usize = 0;

/// Slot index of the target in a service payment.
pub const TARGET_SLOT: usize = 1;

/// Per-denomination totals of `coins`, ordered by denomination.
pub fn sum_coins<'a, I>(coins: I) -> Result<Vec<Coin>, SigningError>
where
    I: IntoIterator<Item = &'a Coin>,
{
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for coin in coins {
        let total = totals.entry(coin.denom.as_str()).or_insert(0);
        *total = total.checked_add(coin.amount).ok_or_else(|| {
            SigningError::MalformedTransaction(format!("{} amount overflows", coin.denom))
        })?;
    }
    Ok(totals
        .into_iter()
        .map(|(denom, amount)| Coin::new(denom, amount))
        .collect())
}

/// Input slot spending `coins` from the account of `public_key`.
///
/// The public key travels with the input on the account's first transaction
/// (sequence 1), so the node can learn it.
pub fn signer_input(public_key: &PublicKey, coins: Vec<Coin>, sequence: u64) -> TxInput {
    TxInput {
        address: public_key.address().as_bytes().to_vec(),
        coins,
        sequence,
        signature: None,
        pub_key: (sequence == 1).then(|| public_key.to_msg()),
    }
}

/// Arguments of a value transfer.
#[derive(Debug, Clone)]
pub struct SendParams {
    pub outputs: Vec<TxOutput>,
    pub fee: Coin,
    pub gas: u64,
    pub sequence: u64,
}

/// Build an unsigned transfer from the account of `from`.
pub fn build_send(from: &PublicKey, params: SendParams) -> Result<Tx, SigningError> {
    if params.outputs.is_empty() {
        return Err(SigningError::MalformedTransaction(
            "transfer has no outputs".to_string(),
        ));
    }
    for output in &params.outputs {
        Address::from_bytes(&output.address)
            .map_err(|e| SigningError::MalformedTransaction(e.to_string()))?;
    }
    check_sequence(params.sequence)?;

    let coins = sum_coins(params.outputs.iter().flat_map(|o| o.coins.iter()))?;
    let input = signer_input(from, coins, params.sequence);

    Ok(Tx {
        kind: Some(TxKind::Send(SendTx {
            gas: params.gas,
            fee: Some(params.fee),
            inputs: vec![input],
            outputs: params.outputs,
        })),
    })
}

/// Arguments of a payment-channel reservation.
#[derive(Debug, Clone)]
pub struct ReserveFundParams {
    pub fund: Vec<Coin>,
    pub collateral: Vec<Coin>,
    pub resource_ids: Vec<String>,
    pub duration: u64,
    pub fee: Coin,
    pub gas: u64,
    pub sequence: u64,
}

/// Build an unsigned reservation funded by the account of `source`.
pub fn build_reserve_fund(
    source: &PublicKey,
    params: ReserveFundParams,
) -> Result<Tx, SigningError> {
    if params.resource_ids.is_empty() {
        return Err(SigningError::MalformedTransaction(
            "reservation names no resources".to_string(),
        ));
    }
    check_sequence(params.sequence)?;

    let fund = sum_coins(&params.fund)?;
    let collateral = sum_coins(&params.collateral)?;

    Ok(Tx {
        kind: Some(TxKind::ReserveFund(ReserveFundTx {
            gas: params.gas,
            fee: Some(params.fee),
            source: Some(signer_input(source, fund, params.sequence)),
            collateral,
            resource_ids: params.resource_ids,
            duration: params.duration,
        })),
    })
}

/// Arguments of an off-chain service payment.
#[derive(Debug, Clone)]
pub struct ServicePaymentParams {
    pub target: Address,
    pub amount: Vec<Coin>,
    pub payment_sequence: u64,
    pub reserve_sequence: u64,
    pub resource_id: String,
    pub fee: Coin,
    pub gas: u64,
}

/// Build the source half of a service payment voucher.
///
/// The target slot carries only its address until the target submits the voucher.
pub fn build_service_payment(
    source: &PublicKey,
    params: ServicePaymentParams,
) -> Result<Tx, SigningError> {
    if params.resource_id.is_empty() {
        return Err(SigningError::MalformedTransaction(
            "service payment has no resource id".to_string(),
        ));
    }
    let amount = sum_coins(&params.amount)?;

    Ok(Tx {
        kind: Some(TxKind::ServicePayment(ServicePaymentTx {
            gas: params.gas,
            fee: Some(params.fee),
            source: Some(signer_input(source, amount, 0)),
            target: Some(TxInput {
                address: params.target.as_bytes().to_vec(),
                ..Default::default()
            }),
            payment_sequence: params.payment_sequence,
            reserve_sequence: params.reserve_sequence,
            resource_id: params.resource_id,
        })),
    })
}

/// Prepare the target slot of a service payment for counter-signing by `target`.
pub fn prepare_target(tx: &mut Tx, target: &PublicKey, sequence: u64) -> Result<(), SigningError> {
    check_sequence(sequence)?;
    let payment = match tx.kind.as_mut() {
        Some(TxKind::ServicePayment(payment)) => payment,
        _ => {
            return Err(SigningError::MalformedTransaction(
                "not a service payment".to_string(),
            ))
        }
    };
    let slot = payment.target.as_mut().ok_or_else(|| {
        SigningError::MalformedTransaction("service payment has no target".to_string())
    })?;

    let address = target.address();
    if slot.address.as_slice() != address.as_bytes() {
        return Err(SigningError::SignerNotAuthorized {
            address: address.to_hex(),
        });
    }

    *slot = signer_input(target, std::mem::take(&mut slot.coins), sequence);
    Ok(())
}

fn check_sequence(sequence: u64) -> Result<(), SigningError> {
    if sequence == 0 {
        return Err(SigningError::MalformedTransaction(
            "sequence must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn is_signed(input: &TxInput) -> bool {
    input
        .signature
        .as_ref()
        .is_some_and(|s| !s.ed25519.is_empty())
}

impl Tx {
    /// Decode wire bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningError> {
        let tx = Tx::decode(bytes).map_err(|e| SigningError::Decode(e.to_string()))?;
        tx.validate()?;
        Ok(tx)
    }

    /// Canonical wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.as_ref().map(TxKind::name).unwrap_or("empty")
    }

    fn validate(&self) -> Result<(), SigningError> {
        let ok = match &self.kind {
            None => false,
            Some(TxKind::Send(send)) => !send.inputs.is_empty(),
            Some(TxKind::ReserveFund(reserve)) => reserve.source.is_some(),
            Some(TxKind::ServicePayment(payment)) => {
                payment.source.is_some() && payment.target.is_some()
            }
        };
        if ok {
            Ok(())
        } else {
            Err(SigningError::MalformedTransaction(format!(
                "{} transaction is missing signer slots",
                self.kind_name()
            )))
        }
    }

    /// Signer slots in order.
    pub fn inputs(&self) -> Vec<&TxInput> {
        match &self.kind {
            None => Vec::new(),
            Some(TxKind::Send(send)) => send.inputs.iter().collect(),
            Some(TxKind::ReserveFund(reserve)) => reserve.source.iter().collect(),
            Some(TxKind::ServicePayment(payment)) => {
                payment.source.iter().chain(payment.target.iter()).collect()
            }
        }
    }

    pub fn inputs_mut(&mut self) -> Vec<&mut TxInput> {
        match &mut self.kind {
            None => Vec::new(),
            Some(TxKind::Send(send)) => send.inputs.iter_mut().collect(),
            Some(TxKind::ReserveFund(reserve)) => reserve.source.iter_mut().collect(),
            Some(TxKind::ServicePayment(payment)) => payment
                .source
                .iter_mut()
                .chain(payment.target.iter_mut())
                .collect(),
        }
    }

    /// Slot that `address` should sign.
    ///
    /// The first matching slot that is still unsigned wins; if every matching slot
    /// already carries a signature, the first match is re-signed.
    pub fn signer_slot(&self, address: &Address) -> Option<usize> {
        let inputs = self.inputs();
        let matches = |input: &&TxInput| input.address.as_slice() == address.as_bytes();
        inputs
            .iter()
            .position(|input| matches(input) && !is_signed(input))
            .or_else(|| inputs.iter().position(|input| matches(input)))
    }

    /// Canonical bytes signed by the holder of `slot`.
    pub fn sign_bytes(&self, slot: usize) -> Result<Vec<u8>, SigningError> {
        self.validate()?;
        if slot >= self.inputs().len() {
            return Err(SigningError::MalformedTransaction(format!(
                "no signer slot {}",
                slot
            )));
        }

        let mut view = self.clone();
        match view.kind.as_mut() {
            Some(TxKind::ServicePayment(payment)) if slot == SOURCE_SLOT => {
                payment.source = payment.source.take().map(|s| TxInput {
                    address: s.address,
                    coins: s.coins,
                    ..Default::default()
                });
                payment.target = payment.target.take().map(|t| TxInput {
                    address: t.address,
                    ..Default::default()
                });
                payment.fee = None;
                payment.gas = 0;
            }
            Some(TxKind::ServicePayment(payment)) => {
                if let Some(target) = payment.target.as_mut() {
                    target.signature = Some(SignatureMsg::default());
                }
            }
            _ => {
                for input in view.inputs_mut() {
                    input.signature = Some(SignatureMsg::default());
                }
            }
        }
        Ok(view.encode_to_vec())
    }

    /// Place `signature` into `slot`.
    pub fn attach_signature(
        &mut self,
        slot: usize,
        signature: [u8; SIGNATURE_LEN],
    ) -> Result<(), SigningError> {
        let mut inputs = self.inputs_mut();
        let input = inputs.get_mut(slot).ok_or_else(|| {
            SigningError::MalformedTransaction(format!("no signer slot {}", slot))
        })?;
        input.signature = Some(SignatureMsg {
            ed25519: signature.to_vec(),
        });
        Ok(())
    }
}
