//! Ed25519 key material, address derivation and storage encodings.
//!
//! # Encodings
//! ```text
//! stored public key  = 0x12 0x20 ‖ pk              (PubKeyMsg, tag 2)
//! stored private key = 0x12 0x40 ‖ seed ‖ pk       (PrivKeyMsg, tag 2)
//! address            = RIPEMD-160(0x01 ‖ 0x01 0x20 ‖ pk)
//! ```
//!
//! # Security
//! - Seeds live in zeroize-on-drop buffers
//! - `Debug` on [`PrivateKey`] never prints key bytes
//! - Recovery phrases are for operator backup only and are never persisted

use std::fmt;
use std::str::FromStr;

use bip39::Mnemonic;
use ed25519_dalek::{Signer, SigningKey};
use prost::Message;
use rand::rngs::OsRng;
use rand::RngCore;
use ripemd::{Digest, Ripemd160};
use zeroize::{Zeroize, Zeroizing};

use crate::blockchain::types::PubKeyMsg;
use crate::vault::error::KeyError;

/// Length of an Ed25519 seed / public key.
pub const KEY_LEN: usize = 32;

/// Length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Length of a derived address.
pub const ADDRESS_LEN: usize = 20;

/// Type tag of Ed25519 keys in the length-prefixed hashing encoding.
const ED25519_TYPE_BYTE: u8 = 0x01;

/// Storage encoding of a private key: seed followed by the public key.
#[derive(Clone, PartialEq, Message)]
#[prost(skip_debug)]
struct PrivKeyMsg {
    #[prost(bytes = "vec", tag = "2")]
    ed25519: Vec<u8>,
}

impl fmt::Debug for PrivKeyMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivKeyMsg(<redacted>)")
    }
}

// ─── Public key ──────────────────────────────────────────────────────────────

/// An Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; KEY_LEN] = bytes.try_into().map_err(|_| KeyError::InvalidLength {
            expected: KEY_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Type-tagged, length-prefixed encoding that the address hashes over.
    fn hashing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(3 + KEY_LEN);
        buf.push(ED25519_TYPE_BYTE);
        // length prefix: one size byte, then the big-endian length
        buf.push(0x01);
        buf.push(KEY_LEN as u8);
        buf.extend_from_slice(&self.0);
        buf
    }

    /// Derive the account address owned by this key.
    pub fn address(&self) -> Address {
        let digest = Ripemd160::digest(self.hashing_bytes());
        let mut out = [0u8; ADDRESS_LEN];
        out.copy_from_slice(&digest);
        Address(out)
    }

    /// Protobuf wrapper used inside transactions.
    pub fn to_msg(&self) -> PubKeyMsg {
        PubKeyMsg {
            ed25519: self.0.to_vec(),
        }
    }

    /// Bytes persisted by the vault.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        self.to_msg().encode_to_vec()
    }

    pub fn from_storage_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let msg = PubKeyMsg::decode(bytes).map_err(|e| KeyError::Malformed(e.to_string()))?;
        Self::from_bytes(&msg.ed25519)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

// ─── Private key ─────────────────────────────────────────────────────────────

/// An Ed25519 private key (32-byte seed).
#[derive(Clone)]
pub struct PrivateKey {
    seed: Zeroizing<[u8; KEY_LEN]>,
}

impl PrivateKey {
    /// Generate a fresh key from the OS entropy source.
    pub fn generate() -> Result<Self, KeyError> {
        let mut seed = Zeroizing::new([0u8; KEY_LEN]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| KeyError::Entropy(e.to_string()))?;
        Ok(Self { seed })
    }

    pub fn from_seed(seed: &[u8]) -> Result<Self, KeyError> {
        if seed.len() != KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: KEY_LEN,
                actual: seed.len(),
            });
        }
        let mut buf = Zeroizing::new([0u8; KEY_LEN]);
        buf.copy_from_slice(seed);
        Ok(Self { seed: buf })
    }

    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key().verifying_key().to_bytes())
    }

    /// Deterministic Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing_key().sign(message).to_bytes()
    }

    /// Bytes persisted by the vault (`seed ‖ pk` wrapped in a length-delimited field 2).
    pub fn to_storage_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut raw = Zeroizing::new(Vec::with_capacity(2 * KEY_LEN));
        raw.extend_from_slice(&self.seed[..]);
        raw.extend_from_slice(self.public_key().as_bytes());
        let msg = PrivKeyMsg {
            ed25519: raw.to_vec(),
        };
        let encoded = Zeroizing::new(msg.encode_to_vec());
        let mut inner = msg.ed25519;
        inner.zeroize();
        encoded
    }

    pub fn from_storage_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let msg = PrivKeyMsg::decode(bytes).map_err(|e| KeyError::Malformed(e.to_string()))?;
        let raw = Zeroizing::new(msg.ed25519);
        if raw.len() != 2 * KEY_LEN {
            return Err(KeyError::InvalidLength {
                expected: 2 * KEY_LEN,
                actual: raw.len(),
            });
        }
        let key = Self::from_seed(&raw[..KEY_LEN])?;
        if key.public_key().as_bytes()[..] != raw[KEY_LEN..] {
            return Err(KeyError::Mismatch);
        }
        Ok(key)
    }

    /// Operator backup phrase (BIP-39, 24 words) for this key.
    pub fn recovery_phrase(&self) -> Result<Zeroizing<String>, KeyError> {
        let mnemonic = Zeroizing::new(
            Mnemonic::from_entropy(&self.seed[..])
                .map_err(|e| KeyError::RecoveryPhrase(e.to_string()))?,
        );
        Ok(Zeroizing::new(mnemonic.to_string()))
    }

    /// Restore a key from its recovery phrase.
    pub fn from_recovery_phrase(phrase: &str) -> Result<Self, KeyError> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .map(str::to_lowercase)
                .collect::<Vec<_>>()
                .join(" "),
        );
        let mnemonic = Zeroizing::new(
            Mnemonic::parse_normalized(&normalized)
                .map_err(|e| KeyError::RecoveryPhrase(e.to_string()))?,
        );
        let entropy = Zeroizing::new(mnemonic.to_entropy());
        Self::from_seed(&entropy)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

// ─── Address ─────────────────────────────────────────────────────────────────

/// 20-byte account address derived from a public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let raw: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            KeyError::InvalidAddress(format!("expected {} bytes, got {}", ADDRESS_LEN, bytes.len()))
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = KeyError;

    /// Accepts upper or lower case hex, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits).map_err(|e| KeyError::InvalidAddress(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Derive the address of a public key.
pub fn derive_address(public_key: &PublicKey) -> Address {
    public_key.address()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_PUB: &str = "1220355897db094c7aac8242e0bce8ae6a4db8b6c08b38bed3290ea3560a6515cc3b";
    const FIXTURE_PRIV: &str = "12406f77b49c99cb22d63f84ffc7da54da0141b91f86627dda1c37a0bfe3eb1111e7355897db094c7aac8242e0bce8ae6a4db8b6c08b38bed3290ea3560a6515cc3b";
    const FIXTURE_ADDRESS: &str = "2674ae64cb5206b2afc6b6fbd0e5a65c025b5016";

    #[test]
    fn test_fixture_address_derivation() {
        let public_key = PublicKey::from_storage_bytes(&hex::decode(FIXTURE_PUB).unwrap()).unwrap();
        assert_eq!(derive_address(&public_key).to_hex(), FIXTURE_ADDRESS);
        // Derivation is a pure function of the key
        assert_eq!(derive_address(&public_key), derive_address(&public_key));
    }

    #[test]
    fn test_fixture_private_key_decodes() {
        let private_key =
            PrivateKey::from_storage_bytes(&hex::decode(FIXTURE_PRIV).unwrap()).unwrap();
        let public_key = PublicKey::from_storage_bytes(&hex::decode(FIXTURE_PUB).unwrap()).unwrap();
        assert_eq!(private_key.public_key(), public_key);
        assert_eq!(hex::encode(private_key.to_storage_bytes().as_slice()), FIXTURE_PRIV);
        assert_eq!(hex::encode(public_key.to_storage_bytes()), FIXTURE_PUB);
    }

    #[test]
    fn test_mismatched_private_key_rejected() {
        let mut bytes = hex::decode(FIXTURE_PRIV).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let result = PrivateKey::from_storage_bytes(&bytes);
        assert!(matches!(result, Err(KeyError::Mismatch)));
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = PrivateKey::generate().unwrap();
        let b = PrivateKey::generate().unwrap();
        assert_ne!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_recovery_phrase_restores_key() {
        let key = PrivateKey::generate().unwrap();
        let phrase = key.recovery_phrase().unwrap();
        assert_eq!(phrase.split_whitespace().count(), 24);

        let shouted = phrase.to_uppercase();
        let restored = PrivateKey::from_recovery_phrase(&shouted).unwrap();
        assert_eq!(restored.public_key(), key.public_key());
    }

    #[test]
    fn test_recovery_phrase_rejects_garbage() {
        let result = PrivateKey::from_recovery_phrase("not a real phrase");
        assert!(matches!(result, Err(KeyError::RecoveryPhrase(_))));
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let key = PrivateKey::generate().unwrap();
        assert_eq!(format!("{:?}", key), "PrivateKey(<redacted>)");
    }

    #[test]
    fn test_debug_redacts_storage_message() {
        let msg = PrivKeyMsg::decode(hex::decode(FIXTURE_PRIV).unwrap().as_slice()).unwrap();
        let seed_hex = &FIXTURE_PRIV[4..4 + 2 * KEY_LEN];
        assert_eq!(msg.ed25519.len(), 2 * KEY_LEN);

        let printed = format!("{:?}", msg);
        assert_eq!(printed, "PrivKeyMsg(<redacted>)");
        assert!(!printed.contains(seed_hex));
        assert!(!printed.contains(&format!("{:?}", &msg.ed25519[..4])));
    }

    #[test]
    fn test_address_parsing() {
        let upper: Address = "0xEFEE576F3D668674BC73E007F6ABFA243311BD37".parse().unwrap();
        let lower: Address = "efee576f3d668674bc73e007f6abfa243311bd37".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "efee576f3d668674bc73e007f6abfa243311bd37");

        assert!("efee57".parse::<Address>().is_err());
        assert!("zz".parse::<Address>().is_err());
    }
}
