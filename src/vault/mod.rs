//! Custodial key vault.
//!
//! # Responsibilities
//! - Own the persistence of per-user key records
//! - Provision a keypair lazily on a user's first access
//! - Guarantee exactly one record per user, across processes sharing one store
//!
//! # Design Decisions
//! - Backends implement the [`KeyVault`] trait (lookup + guarded insert); the
//!   get-or-create protocol is a default method so every backend races the same way
//! - Creation conflicts are resolved by the store's uniqueness constraint followed by a
//!   re-read, never by an in-process lock
//! - Private key material lives in zeroize-on-drop buffers and is never logged
//!
//! # Data Flow
//! ```text
//! get_or_create(user_id)
//!     → find_by_user_id ── hit ──▶ record
//!     → miss: generate keypair → create
//!         ── ok ──────────▶ record
//!         ── DuplicateUser ▶ drop candidate → find_by_user_id → record
//! ```

pub mod error;
pub mod keys;
pub mod memory;
pub mod record;
pub mod sqlite;
pub mod store;

pub use error::{KeyError, VaultError, VaultResult};
pub use keys::{derive_address, Address, PrivateKey, PublicKey};
pub use memory::MemoryKeyVault;
pub use record::{KeyRecord, KeyType};
pub use sqlite::SqlKeyVault;
pub use store::KeyVault;
