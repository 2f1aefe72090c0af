//! In-memory key vault for tests and local development.
//!
//! Records disappear with the process. The uniqueness guarantee comes from the
//! map's entry API, which makes insert-if-absent atomic per user.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::vault::error::{VaultError, VaultResult};
use crate::vault::record::KeyRecord;
use crate::vault::store::KeyVault;

/// Process-local [`KeyVault`] backed by a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryKeyVault {
    records: Arc<DashMap<String, KeyRecord>>,
}

impl MemoryKeyVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl KeyVault for MemoryKeyVault {
    async fn find_by_user_id(&self, user_id: &str) -> VaultResult<Option<KeyRecord>> {
        Ok(self.records.get(user_id).map(|r| r.value().clone()))
    }

    async fn create(&self, record: &KeyRecord) -> VaultResult<()> {
        match self.records.entry(record.user_id.clone()) {
            Entry::Occupied(_) => Err(VaultError::DuplicateUser(record.user_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let vault = MemoryKeyVault::new();
        let first = vault.get_or_create("alice").await.unwrap();
        let second = vault.get_or_create("alice").await.unwrap();

        assert_eq!(first.address, second.address);
        assert_eq!(first.public_key, second.public_key);
        assert_eq!(vault.len(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_user() {
        let vault = MemoryKeyVault::new();
        let record = KeyRecord::generate("alice").unwrap();
        vault.create(&record).await.unwrap();

        let replacement = KeyRecord::generate("alice").unwrap();
        let result = vault.create(&replacement).await;
        assert!(matches!(result, Err(VaultError::DuplicateUser(ref u)) if u == "alice"));

        // Original keys are untouched
        let stored = vault.find_by_user_id("alice").await.unwrap().unwrap();
        assert_eq!(stored.address, record.address);
    }

    #[tokio::test]
    async fn test_distinct_users_get_distinct_keys() {
        let vault = MemoryKeyVault::new();
        let alice = vault.get_or_create("alice").await.unwrap();
        let bob = vault.get_or_create("bob").await.unwrap();
        assert_ne!(alice.address, bob.address);
        assert_eq!(vault.len(), 2);
    }
}
