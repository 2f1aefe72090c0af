//! SQL-backed key vault.
//!
//! One table keyed by `user_id`. Binary values are hex-encoded at this boundary and
//! decoded (and re-validated) on read. Several gateway instances may point at the same
//! database file: creation races are settled by the primary-key constraint, never by an
//! in-process lock.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zeroize::Zeroizing;

use crate::vault::error::{VaultError, VaultResult};
use crate::vault::record::KeyRecord;
use crate::vault::store::KeyVault;

/// Table holding one key record per user.
pub const TABLE_NAME: &str = "user_native_wallet";

const SELECT_BY_USER: &str =
    "SELECT address, key_type, pubkey, privkey FROM user_native_wallet WHERE user_id = ?1";

const INSERT_RECORD: &str = "INSERT INTO user_native_wallet (user_id, address, key_type, pubkey, privkey) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

/// [`KeyVault`] over a SQLite database.
#[derive(Clone)]
pub struct SqlKeyVault {
    conn: Arc<Mutex<Connection>>,
}

impl SqlKeyVault {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path, busy_timeout: Duration) -> VaultResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        tracing::info!(
            path = %path.display(),
            journal_mode = %mode,
            "Key vault database opened"
        );

        Self::from_connection(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> VaultResult<Self> {
        run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of stored records.
    pub async fn count(&self) -> VaultResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT count(*) FROM user_native_wallet",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
        .await
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> VaultResult<T>
    where
        F: FnOnce(&Connection) -> VaultResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| VaultError::Storage("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| VaultError::Storage(format!("storage task failed: {}", e)))?
    }
}

fn run_migrations(conn: &Connection) -> VaultResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_native_wallet (
            user_id     TEXT PRIMARY KEY NOT NULL,
            address     TEXT NOT NULL UNIQUE,
            key_type    TEXT NOT NULL DEFAULT 'ed25519',
            pubkey      TEXT NOT NULL,
            privkey     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        ",
    )?;

    tracing::debug!(table = TABLE_NAME, "Key vault migrations completed");
    Ok(())
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

#[async_trait]
impl KeyVault for SqlKeyVault {
    async fn find_by_user_id(&self, user_id: &str) -> VaultResult<Option<KeyRecord>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(SELECT_BY_USER, params![user_id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        Zeroizing::new(row.get::<_, String>(3)?),
                    ))
                })
                .optional()?;

            match row {
                None => Ok(None),
                Some((address, key_type, pubkey, privkey)) => {
                    KeyRecord::from_stored(user_id, &address, &key_type, &pubkey, &privkey)
                        .map(Some)
                }
            }
        })
        .await
    }

    async fn create(&self, record: &KeyRecord) -> VaultResult<()> {
        let user_id = record.user_id.clone();
        let key_type = record.key_type.as_str();
        let (address, pubkey, privkey) = record.to_stored();

        self.with_conn(move |conn| {
            let inserted = conn.execute(
                INSERT_RECORD,
                params![user_id, address, key_type, pubkey, privkey.as_str()],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(e) if is_primary_key_violation(&e) => Err(VaultError::DuplicateUser(user_id)),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_user_creates_single_row() {
        let vault = SqlKeyVault::open_in_memory().unwrap();
        assert_eq!(vault.count().await.unwrap(), 0);

        let first = vault.get_or_create("alice").await.unwrap();
        assert_eq!(vault.count().await.unwrap(), 1);

        let second = vault.get_or_create("alice").await.unwrap();
        assert_eq!(vault.count().await.unwrap(), 1);
        assert_eq!(first.address, second.address);
        assert_eq!(first.public_key, second.public_key);
    }

    #[tokio::test]
    async fn test_find_missing_user() {
        let vault = SqlKeyVault::open_in_memory().unwrap();
        assert!(vault.find_by_user_id("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_user_fails() {
        let vault = SqlKeyVault::open_in_memory().unwrap();
        let record = KeyRecord::generate("alice").unwrap();
        vault.create(&record).await.unwrap();

        let other = KeyRecord::generate("alice").unwrap();
        let result = vault.create(&other).await;
        assert!(matches!(result, Err(VaultError::DuplicateUser(_))));

        let stored = vault.find_by_user_id("alice").await.unwrap().unwrap();
        assert_eq!(stored.address, record.address);
    }

    #[tokio::test]
    async fn test_values_are_hex_encoded_at_rest() {
        let vault = SqlKeyVault::open_in_memory().unwrap();
        let record = vault.get_or_create("alice").await.unwrap();
        let expected_address = record.address.to_hex();

        let (address, pubkey) = vault
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT address, pubkey FROM user_native_wallet WHERE user_id = 'alice'",
                    [],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )?)
            })
            .await
            .unwrap();

        assert_eq!(address, expected_address);
        assert!(pubkey.starts_with("1220"));
        assert_eq!(pubkey.len(), 68);
    }

    #[tokio::test]
    async fn test_corrupt_row_is_reported() {
        let vault = SqlKeyVault::open_in_memory().unwrap();
        vault
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO user_native_wallet (user_id, address, key_type, pubkey, privkey) \
                     VALUES ('mallory', 'zz', 'ed25519', '00', '00')",
                    [],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let result = vault.find_by_user_id("mallory").await;
        assert!(matches!(result, Err(VaultError::CorruptRecord { .. })));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert!(run_migrations(&conn).is_ok());
    }
}
