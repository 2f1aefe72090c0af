//! The persisted per-user key record.

use std::fmt;
use std::str::FromStr;

use crate::vault::error::{KeyError, VaultError, VaultResult};
use crate::vault::keys::{Address, PrivateKey, PublicKey};

/// Signature algorithm of a key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    Ed25519,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ed25519" => Ok(KeyType::Ed25519),
            other => Err(KeyError::Malformed(format!("unknown key type '{}'", other))),
        }
    }
}

/// One user's identity and keypair.
///
/// Records are immutable once created: there is no rotation and no update path.
/// `address` is always `derive_address(public_key)`.
#[derive(Debug, Clone)]
pub struct KeyRecord {
    pub user_id: String,
    pub address: Address,
    pub key_type: KeyType,
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl KeyRecord {
    /// Assemble a record from a private key, deriving the public key and address.
    pub fn from_private_key(user_id: impl Into<String>, private_key: PrivateKey) -> Self {
        let public_key = private_key.public_key();
        Self {
            user_id: user_id.into(),
            address: public_key.address(),
            key_type: KeyType::Ed25519,
            public_key,
            private_key,
        }
    }

    /// Generate a fresh keypair for `user_id`.
    pub fn generate(user_id: &str) -> VaultResult<Self> {
        let private_key =
            PrivateKey::generate().map_err(|e| VaultError::KeyGeneration(e.to_string()))?;
        Ok(Self::from_private_key(user_id, private_key))
    }

    /// Rebuild a record from its stored (hex-encoded) columns.
    ///
    /// Every invariant is re-checked: the private key must match the public key and the
    /// stored address must be the one derived from the public key.
    pub fn from_stored(
        user_id: String,
        address_hex: &str,
        key_type: &str,
        public_key_hex: &str,
        private_key_hex: &str,
    ) -> VaultResult<Self> {
        let corrupt = |reason: String| VaultError::CorruptRecord {
            user_id: user_id.clone(),
            reason,
        };

        let key_type: KeyType = key_type.parse().map_err(|e: KeyError| corrupt(e.to_string()))?;
        let public_bytes = hex::decode(public_key_hex).map_err(|e| corrupt(e.to_string()))?;
        let public_key =
            PublicKey::from_storage_bytes(&public_bytes).map_err(|e| corrupt(e.to_string()))?;
        let private_bytes = zeroize::Zeroizing::new(
            hex::decode(private_key_hex).map_err(|e| corrupt(e.to_string()))?,
        );
        let private_key =
            PrivateKey::from_storage_bytes(&private_bytes).map_err(|e| corrupt(e.to_string()))?;
        let address: Address = address_hex.parse().map_err(|e: KeyError| corrupt(e.to_string()))?;

        if private_key.public_key() != public_key {
            return Err(corrupt("private key does not match public key".to_string()));
        }
        if public_key.address() != address {
            return Err(corrupt("address does not match public key".to_string()));
        }

        Ok(Self {
            user_id,
            address,
            key_type,
            public_key,
            private_key,
        })
    }

    /// Hex-encoded columns as persisted: `(address, public_key, private_key)`.
    pub fn to_stored(&self) -> (String, String, zeroize::Zeroizing<String>) {
        (
            self.address.to_hex(),
            hex::encode(self.public_key.to_storage_bytes()),
            zeroize::Zeroizing::new(hex::encode(self.private_key.to_storage_bytes().as_slice())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_record_invariants() {
        let record = KeyRecord::generate("alice").unwrap();
        assert_eq!(record.user_id, "alice");
        assert_eq!(record.address, record.public_key.address());
        assert_eq!(record.private_key.public_key(), record.public_key);
        assert_eq!(record.key_type, KeyType::Ed25519);
    }

    #[test]
    fn test_stored_columns_roundtrip() {
        let record = KeyRecord::generate("bob").unwrap();
        let (address, public_key, private_key) = record.to_stored();
        let restored =
            KeyRecord::from_stored("bob".into(), &address, "ed25519", &public_key, &private_key)
                .unwrap();
        assert_eq!(restored.address, record.address);
        assert_eq!(restored.public_key, record.public_key);
    }

    #[test]
    fn test_stored_address_must_match_key() {
        let record = KeyRecord::generate("carol").unwrap();
        let other = KeyRecord::generate("dave").unwrap();
        let (_, public_key, private_key) = record.to_stored();
        let result = KeyRecord::from_stored(
            "carol".into(),
            &other.address.to_hex(),
            "ed25519",
            &public_key,
            &private_key,
        );
        assert!(matches!(result, Err(VaultError::CorruptRecord { .. })));
    }

    #[test]
    fn test_unknown_key_type_rejected() {
        let record = KeyRecord::generate("erin").unwrap();
        let (address, public_key, private_key) = record.to_stored();
        let result =
            KeyRecord::from_stored("erin".into(), &address, "secp256k1", &public_key, &private_key);
        assert!(result.is_err());
    }
}
