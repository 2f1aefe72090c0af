//! Transaction signing.
//!
//! Signing is a pure function of (key pair, unsigned transaction): Ed25519 signatures
//! are deterministic and the sign-bytes are canonical, so the same inputs always yield
//! byte-identical output.

use crate::blockchain::types::{SigningError, Tx};
use crate::vault::keys::{PrivateKey, PublicKey};
use crate::vault::record::KeyRecord;

/// Sign `tx` with the key pair and return the broadcast-ready wire bytes.
///
/// The signature lands in the slot owned by `public_key`'s address. Fails with
/// [`SigningError::SignerNotAuthorized`] when no such slot exists.
pub fn sign(
    public_key: &PublicKey,
    private_key: &PrivateKey,
    tx: &Tx,
) -> Result<Vec<u8>, SigningError> {
    if private_key.public_key() != *public_key {
        return Err(SigningError::KeyMismatch);
    }

    let address = public_key.address();
    let slot = tx
        .signer_slot(&address)
        .ok_or_else(|| SigningError::SignerNotAuthorized {
            address: address.to_hex(),
        })?;

    let sign_bytes = tx.sign_bytes(slot)?;
    let signature = private_key.sign(&sign_bytes);

    let mut signed = tx.clone();
    signed.attach_signature(slot, signature)?;

    tracing::debug!(
        address = %address,
        kind = signed.kind_name(),
        slot,
        "Transaction signed"
    );

    Ok(signed.to_bytes())
}

/// Signing capability handed to the gateway.
pub trait TransactionSigner: Send + Sync {
    fn sign(&self, record: &KeyRecord, tx: &Tx) -> Result<Vec<u8>, SigningError>;
}

/// Ed25519 signer over vault records.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Signer;

impl TransactionSigner for Ed25519Signer {
    fn sign(&self, record: &KeyRecord, tx: &Tx) -> Result<Vec<u8>, SigningError> {
        sign(&record.public_key, &record.private_key, tx)
    }
}
