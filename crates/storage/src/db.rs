//! sled database wrapper with serialization helpers.

use sealchain_core::Hash;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Invalid chain extension: {0}")]
    InvalidBlock(String),
}

impl From<TransactionError<StorageError>> for StorageError {
    fn from(e: TransactionError<StorageError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StorageError::Database(e),
        }
    }
}

/// An encoded key/value pair, ready for [`Storage::put_all`].
pub type Entry = (Vec<u8>, Vec<u8>);

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Wrapper around a sled database with bincode (de)serialization.
///
/// Cloning is cheap and every clone refers to the same database.
#[derive(Clone)]
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a database that is removed when dropped (for tests and tools).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Store a serializable value.
    pub fn put<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize,
    {
        let encoded = bincode::serialize(value)?;
        self.db.insert(key, encoded)?;
        Ok(())
    }

    /// Encode a value for a batched write.
    pub fn entry<K, V>(key: K, value: &V) -> Result<Entry>
    where
        K: AsRef<[u8]>,
        V: serde::Serialize,
    {
        Ok((key.as_ref().to_vec(), bincode::serialize(value)?))
    }

    /// Write every entry in one transaction: either all land or none do.
    pub fn put_all(&self, entries: &[Entry]) -> Result<()> {
        self.db.transaction(|tx| {
            for (key, value) in entries {
                tx.insert(key.as_slice(), value.as_slice())?;
            }
            Ok::<_, ConflictableTransactionError<StorageError>>(())
        })?;
        Ok(())
    }

    /// Retrieve and deserialize a value.
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: serde::de::DeserializeOwned,
    {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete<K: AsRef<[u8]>>(&self, key: K) -> Result<()> {
        self.db.remove(key)?;
        Ok(())
    }

    pub fn contains<K: AsRef<[u8]>>(&self, key: K) -> Result<bool> {
        Ok(self.db.contains_key(key)?)
    }

    /// The underlying sled database, for range scans and transactions.
    pub fn inner(&self) -> &Db {
        &self.db
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key Construction Helpers
    // =========================================================================

    /// Format: "block:height:" + big-endian height, so heights sort numerically.
    pub fn block_height_key(height: u64) -> Vec<u8> {
        let mut key = b"block:height:".to_vec();
        key.extend_from_slice(&height.to_be_bytes());
        key
    }

    /// Format: "block:hash:" + hash_bytes
    pub fn block_hash_key(hash: &Hash) -> Vec<u8> {
        let mut key = b"block:hash:".to_vec();
        key.extend_from_slice(&hash.0);
        key
    }

    /// Prefix of every vault record key; records sort by alias under it.
    pub const VAULT_ALIAS_PREFIX: &'static [u8] = b"vault:alias:";

    /// Format: "vault:alias:" + alias
    pub fn vault_alias_key(alias: &str) -> Vec<u8> {
        let mut key = Self::VAULT_ALIAS_PREFIX.to_vec();
        key.extend_from_slice(alias.as_bytes());
        key
    }

    /// Format: "vault:xpub:" + 64-byte extended public key
    pub fn vault_xpub_key(xpub: &[u8; 64]) -> Vec<u8> {
        let mut key = b"vault:xpub:".to_vec();
        key.extend_from_slice(xpub);
        key
    }
}
