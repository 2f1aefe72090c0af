//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vault_gateway::blockchain::client::{RpcResponse, UpstreamClient};
use vault_gateway::blockchain::types::{BlockchainResult, SigningError, Tx};
use vault_gateway::blockchain::{Ed25519Signer, TransactionSigner};
use vault_gateway::gateway::GatewayHandler;
use vault_gateway::vault::{
    KeyRecord, KeyVault, MemoryKeyVault, PrivateKey, VaultError, VaultResult,
};

pub const FIXTURE_PRIV: &str = "12406f77b49c99cb22d63f84ffc7da54da0141b91f86627dda1c37a0bfe3eb1111e7355897db094c7aac8242e0bce8ae6a4db8b6c08b38bed3290ea3560a6515cc3b";
pub const FIXTURE_ADDRESS: &str = "2674ae64cb5206b2afc6b6fbd0e5a65c025b5016";
pub const FIXTURE_RECIPIENT: &str = "efee576f3d668674bc73e007f6abfa243311bd37";
pub const SIGNED_FIXTURE: &str = "12c7010805120c0a0847616d6d6157656910041a8e010a142674ae64cb5206b2afc6b6fbd0e5a65c025b5016120c0a085468657461576569107b1801224212406c6dbdf253f520028743823c395cdb03dbf7ed399a8e6b251b5ac11d2ee1cb52c92380474884d281933288b7e7249954c8d595c94d85c19d9083c4307b811a062a221220355897db094c7aac8242e0bce8ae6a4db8b6c08b38bed3290ea3560a6515cc3b22240a14efee576f3d668674bc73e007f6abfa243311bd37120c0a085468657461576569107b";

/// Record holding the fixture keypair.
pub fn fixture_record(user_id: &str) -> KeyRecord {
    let private_key =
        PrivateKey::from_storage_bytes(&hex::decode(FIXTURE_PRIV).unwrap()).unwrap();
    KeyRecord::from_private_key(user_id, private_key)
}

/// In-memory vault pre-seeded with `records`.
pub async fn seeded_vault(records: &[KeyRecord]) -> Arc<MemoryKeyVault> {
    let vault = Arc::new(MemoryKeyVault::new());
    for record in records {
        vault.create(record).await.unwrap();
    }
    vault
}

/// Upstream node double: scripted responses per method, every call recorded.
#[derive(Default)]
pub struct MockUpstream {
    responses: Mutex<HashMap<String, RpcResponse>>,
    calls: Mutex<Vec<(String, Value)>>,
    delay: Option<Duration>,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responds to every call only after `delay`.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(self, method: &str, response: RpcResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(method.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn call(&self, method: &str, params: Value) -> BlockchainResult<RpcResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.responses.lock().unwrap().get(method).cloned();
        Ok(scripted.unwrap_or_else(|| RpcResponse::failure(-32601, "method not scripted")))
    }
}

/// Signer that counts how often it was asked to sign.
#[derive(Default)]
pub struct CountingSigner {
    pub count: AtomicUsize,
}

impl CountingSigner {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl TransactionSigner for CountingSigner {
    fn sign(&self, record: &KeyRecord, tx: &Tx) -> Result<Vec<u8>, SigningError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ed25519Signer.sign(record, tx)
    }
}

/// Vault whose storage is always unavailable.
pub struct FailingVault;

#[async_trait]
impl KeyVault for FailingVault {
    async fn find_by_user_id(&self, _user_id: &str) -> VaultResult<Option<KeyRecord>> {
        Err(VaultError::Storage("database is locked".to_string()))
    }

    async fn create(&self, _record: &KeyRecord) -> VaultResult<()> {
        Err(VaultError::Storage("database is locked".to_string()))
    }
}

/// Handler over `vault` and `upstream` with a counting signer.
pub fn handler(
    vault: Arc<dyn KeyVault>,
    upstream: Arc<MockUpstream>,
) -> (GatewayHandler, Arc<CountingSigner>) {
    let signer = Arc::new(CountingSigner::default());
    let handler = GatewayHandler::new(vault, upstream, Duration::from_secs(5))
        .with_signer(signer.clone());
    (handler, signer)
}
