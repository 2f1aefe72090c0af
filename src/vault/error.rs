//! Key vault error types.

use thiserror::Error;

/// Errors raised while decoding, deriving or generating key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Byte string has the wrong length for the key kind.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Stored encoding could not be parsed.
    #[error("malformed key encoding: {0}")]
    Malformed(String),

    /// The public half stored next to a private seed does not match it.
    #[error("private key does not match its public half")]
    Mismatch,

    /// The OS entropy source failed.
    #[error("entropy source failure: {0}")]
    Entropy(String),

    /// Recovery phrase could not be parsed or converted.
    #[error("invalid recovery phrase: {0}")]
    RecoveryPhrase(String),

    /// Address is not 20 bytes of hex.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

/// Errors surfaced by a [`KeyVault`](crate::vault::KeyVault) backend.
///
/// None of the variants ever carries private key material.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Persistence I/O failure. Safe to retry.
    #[error("storage error: {0}")]
    Storage(String),

    /// A record for this user already exists (uniqueness constraint).
    #[error("a key record already exists for user {0}")]
    DuplicateUser(String),

    /// Key generation failed (entropy or algorithm failure).
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// A stored row could not be decoded into a valid record.
    #[error("corrupt key record for user {user_id}: {reason}")]
    CorruptRecord { user_id: String, reason: String },
}

impl From<rusqlite::Error> for VaultError {
    fn from(e: rusqlite::Error) -> Self {
        VaultError::Storage(e.to_string())
    }
}

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::DuplicateUser("alice".to_string());
        assert_eq!(err.to_string(), "a key record already exists for user alice");

        let err = KeyError::InvalidLength {
            expected: 32,
            actual: 31,
        };
        assert!(err.to_string().contains("expected 32"));
    }
}
