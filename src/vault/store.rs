//! The key vault capability.

use async_trait::async_trait;

use crate::observability::metrics;
use crate::vault::error::{VaultError, VaultResult};
use crate::vault::record::KeyRecord;

/// Storage capability owning all key records.
///
/// Backends only provide lookup and a uniqueness-guarded insert; the get-or-create
/// protocol on top of them is shared.
#[async_trait]
pub trait KeyVault: Send + Sync {
    /// Look up the record for `user_id`.
    async fn find_by_user_id(&self, user_id: &str) -> VaultResult<Option<KeyRecord>>;

    /// Persist a fully-formed record.
    ///
    /// Fails with [`VaultError::DuplicateUser`] when a record for that user already
    /// exists. Never overwrites a row.
    async fn create(&self, record: &KeyRecord) -> VaultResult<()>;

    /// Return the user's record, provisioning one on first access.
    ///
    /// Concurrent first accesses for the same user converge on a single record: the
    /// insert is guarded by the backend's uniqueness constraint, and the loser of the
    /// race discards its keypair and re-reads the winner's row.
    async fn get_or_create(&self, user_id: &str) -> VaultResult<KeyRecord> {
        if let Some(record) = self.find_by_user_id(user_id).await? {
            return Ok(record);
        }

        tracing::info!(user_id = %user_id, "No key record for user, provisioning keys");
        let candidate = KeyRecord::generate(user_id).inspect_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Key generation failed");
        })?;

        match self.create(&candidate).await {
            Ok(()) => {
                metrics::record_key_created();
                tracing::info!(
                    user_id = %user_id,
                    address = %candidate.address,
                    "Provisioned key record"
                );
                Ok(candidate)
            }
            Err(VaultError::DuplicateUser(_)) => {
                drop(candidate);
                metrics::record_creation_conflict();
                tracing::debug!(user_id = %user_id, "Lost provisioning race, re-reading stored record");
                self.find_by_user_id(user_id).await?.ok_or_else(|| {
                    VaultError::Storage(format!(
                        "record for user {} missing after uniqueness conflict",
                        user_id
                    ))
                })
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to persist key record");
                Err(e)
            }
        }
    }
}
