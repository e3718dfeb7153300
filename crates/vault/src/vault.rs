//! The key vault: HD root keys stored under unique aliases.
//!
//! Storage layout (inside the shared sled database):
//!
//! ```text
//! vault:alias:<alias>  -> KeyRecord (alias, xpub, sealed xprv)
//! vault:xpub:<xpub>    -> alias
//! ```
//!
//! Both entries are written in one sled transaction. Writers of the same alias
//! are serialized by a per-alias lock; readers never lock.

use crate::envelope::{KdfParams, SealedSecret};
use crate::error::{Result, VaultError};
use crate::locks::KeyLocks;
use sealchain_core::{DerivationPath, Signature, XPrv, XPub};
use sealchain_storage::Storage;
use serde::{Deserialize, Serialize};
use sled::transaction::ConflictableTransactionError;
use std::ops::Bound;
use tracing::{debug, info};

/// Vault configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Page size used when a listing asks for 0 items.
    pub default_page_size: usize,
    /// Larger listings are rejected, never truncated.
    pub max_page_size: usize,
    pub kdf: KdfParams,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 1000,
            kdf: KdfParams::default(),
        }
    }
}

/// Public view of a stored key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub alias: String,
    pub xpub: XPub,
}

/// One page of a key listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPage {
    pub items: Vec<KeyInfo>,
    /// Cursor for the following page.
    pub next: String,
    pub last_page: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct KeyRecord {
    alias: String,
    xpub: XPub,
    sealed: SealedSecret,
}

impl KeyRecord {
    fn info(&self) -> KeyInfo {
        KeyInfo {
            alias: self.alias.clone(),
            xpub: self.xpub,
        }
    }

    fn unlock(&self, password: &str) -> Result<XPrv> {
        let bytes = self.sealed.open(password)?;
        let bytes: &[u8; 64] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::Corrupt(format!("bad key length for {}", self.alias)))?;
        XPrv::from_bytes(bytes).map_err(|e| VaultError::Corrupt(e.to_string()))
    }
}

/// Trimmed and lowercased; empty aliases are rejected.
pub fn normalize_alias(alias: &str) -> Result<String> {
    let alias = alias.trim().to_lowercase();
    if alias.is_empty() {
        return Err(VaultError::InvalidAlias);
    }
    Ok(alias)
}

/// Encrypted store of HD root keys.
pub struct Vault {
    storage: Storage,
    config: VaultConfig,
    locks: KeyLocks,
}

impl Vault {
    pub fn new(storage: Storage, config: VaultConfig) -> Self {
        Self {
            storage,
            config,
            locks: KeyLocks::default(),
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Generate a new root key and store it under `alias`.
    pub fn create_key(&self, alias: &str, password: &str) -> Result<KeyInfo> {
        let alias = normalize_alias(alias)?;
        let record = self.with_alias_lock(&alias, || {
            if self.storage.contains(Storage::vault_alias_key(&alias))? {
                return Err(VaultError::DuplicateAlias(alias.clone()));
            }

            let xprv = XPrv::generate();
            let record = KeyRecord {
                alias: alias.clone(),
                xpub: xprv.xpub(),
                sealed: SealedSecret::seal(&xprv.to_bytes()[..], password, self.config.kdf)?,
            };
            self.write_record(&record, true)?;
            Ok(record)
        })?;

        info!(alias = %alias, xpub = %record.xpub, "created key");
        Ok(record.info())
    }

    /// List keys ordered by alias, starting after the `after` cursor.
    ///
    /// An empty cursor starts from the beginning; `limit == 0` selects the
    /// default page size.
    pub fn list_keys(&self, after: &str, limit: usize) -> Result<KeyPage> {
        let limit = if limit == 0 {
            self.config.default_page_size
        } else {
            limit
        };
        if limit > self.config.max_page_size {
            return Err(VaultError::TooManyRequested {
                requested: limit,
                max: self.config.max_page_size,
            });
        }

        let prefix = Storage::VAULT_ALIAS_PREFIX;
        let tree = self.storage.inner();
        let iter = if after.is_empty() {
            tree.scan_prefix(prefix)
        } else {
            let start = Storage::vault_alias_key(&decode_cursor(after)?);
            tree.range::<Vec<u8>, _>((Bound::Excluded(start), Bound::Unbounded))
        };

        // One extra entry tells whether anything remains after this page.
        let mut items = Vec::with_capacity(limit.saturating_add(1).min(1024));
        for entry in iter {
            let (key, value) = entry?;
            if !key.starts_with(prefix) {
                break;
            }
            let record: KeyRecord = bincode::deserialize(&value)?;
            items.push(record.info());
            if items.len() > limit {
                break;
            }
        }

        let last_page = items.len() <= limit;
        items.truncate(limit);
        let next = items
            .last()
            .map(|key| hex::encode(key.alias.as_bytes()))
            .unwrap_or_else(|| after.to_string());

        Ok(KeyPage {
            items,
            next,
            last_page,
        })
    }

    /// Remove a key. The password must unlock it.
    pub fn delete_key(&self, xpub: &XPub, password: &str) -> Result<()> {
        let alias = self
            .alias_of(xpub)?
            .ok_or_else(|| VaultError::NotFound(xpub.to_hex()))?;
        self.with_alias_lock(&alias, || {
            let record = self
                .record(&alias, xpub)?
                .ok_or_else(|| VaultError::NotFound(xpub.to_hex()))?;
            record.unlock(password)?;

            let alias_key = Storage::vault_alias_key(&alias);
            let xpub_key = Storage::vault_xpub_key(&xpub.to_bytes());
            self.storage.inner().transaction(|tx| {
                tx.remove(alias_key.as_slice())?;
                tx.remove(xpub_key.as_slice())?;
                Ok::<_, ConflictableTransactionError<VaultError>>(())
            })?;
            Ok(())
        })?;

        info!(alias = %alias, "deleted key");
        Ok(())
    }

    /// Sign `digest` with the child of `xpub` at `path`.
    pub fn sign(
        &self,
        xpub: &XPub,
        path: &DerivationPath,
        digest: &[u8],
        password: &str,
    ) -> Result<Signature> {
        let record = match self.alias_of(xpub)? {
            Some(alias) => self.record(&alias, xpub)?,
            None => None,
        };
        let record = record.ok_or_else(|| VaultError::NoKey(xpub.to_hex()))?;

        let child = record.unlock(password)?.derive(path);
        let signature = child
            .sign(digest)
            .map_err(|e| VaultError::Corrupt(e.to_string()))?;

        debug!(alias = %record.alias, depth = path.len(), "signed digest");
        Ok(signature)
    }

    /// Re-encrypt a key under a new password.
    pub fn reset_password(
        &self,
        xpub: &XPub,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let alias = self
            .alias_of(xpub)?
            .ok_or_else(|| VaultError::NotFound(xpub.to_hex()))?;
        self.with_alias_lock(&alias, || {
            let mut record = self
                .record(&alias, xpub)?
                .ok_or_else(|| VaultError::NotFound(xpub.to_hex()))?;
            let xprv = record.unlock(old_password)?;
            record.sealed =
                SealedSecret::seal(&xprv.to_bytes()[..], new_password, self.config.kdf)?;
            self.write_record(&record, false)
        })?;

        info!(alias = %alias, "reset key password");
        Ok(())
    }

    pub fn get_key(&self, xpub: &XPub) -> Result<Option<KeyInfo>> {
        Ok(match self.alias_of(xpub)? {
            Some(alias) => self.record(&alias, xpub)?.map(|r| r.info()),
            None => None,
        })
    }

    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for entry in self.storage.inner().scan_prefix(Storage::VAULT_ALIAS_PREFIX) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Run `f` holding the write lock of `alias`, then drop idle locks.
    fn with_alias_lock<T>(&self, alias: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let result = {
            let lock = self.locks.get(alias);
            let _guard = lock.lock();
            f()
        };
        self.locks.prune();
        result
    }

    fn alias_of(&self, xpub: &XPub) -> Result<Option<String>> {
        Ok(self.storage.get(Storage::vault_xpub_key(&xpub.to_bytes()))?)
    }

    /// The record stored under `alias`, if it still belongs to `xpub`.
    fn record(&self, alias: &str, xpub: &XPub) -> Result<Option<KeyRecord>> {
        let record: Option<KeyRecord> = self.storage.get(Storage::vault_alias_key(alias))?;
        Ok(record.filter(|r| r.xpub == *xpub))
    }

    /// Write the record and its xpub index atomically. With `create`, an
    /// existing alias aborts the write.
    fn write_record(&self, record: &KeyRecord, create: bool) -> Result<()> {
        let alias_key = Storage::vault_alias_key(&record.alias);
        let xpub_key = Storage::vault_xpub_key(&record.xpub.to_bytes());
        let encoded_record = bincode::serialize(record)?;
        let encoded_alias = bincode::serialize(&record.alias)?;

        self.storage.inner().transaction(|tx| {
            if create && tx.get(alias_key.as_slice())?.is_some() {
                return Err(ConflictableTransactionError::Abort(
                    VaultError::DuplicateAlias(record.alias.clone()),
                ));
            }
            tx.insert(alias_key.as_slice(), encoded_record.as_slice())?;
            tx.insert(xpub_key.as_slice(), encoded_alias.as_slice())?;
            Ok(())
        })?;
        self.storage.flush()?;
        Ok(())
    }
}

fn decode_cursor(after: &str) -> Result<String> {
    let bytes = hex::decode(after).map_err(|_| VaultError::InvalidCursor(after.to_string()))?;
    String::from_utf8(bytes).map_err(|_| VaultError::InvalidCursor(after.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealchain_core::hash;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn vault() -> Vault {
        vault_with(VaultConfig {
            max_page_size: 10,
            ..test_config()
        })
    }

    fn test_config() -> VaultConfig {
        VaultConfig {
            kdf: KdfParams::insecure_fast(),
            ..VaultConfig::default()
        }
    }

    fn vault_with(config: VaultConfig) -> Vault {
        Vault::new(Storage::open_temporary().unwrap(), config)
    }

    #[test]
    fn test_create_and_get() {
        let vault = vault();
        let key = vault.create_key("  Alice ", "pw").unwrap();
        assert_eq!(key.alias, "alice");
        assert_eq!(vault.get_key(&key.xpub).unwrap(), Some(key));
        assert_eq!(vault.len().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_alias() {
        let vault = vault();
        vault.create_key("alice", "pw").unwrap();
        let err = vault.create_key("ALICE", "other").unwrap_err();
        assert!(matches!(err, VaultError::DuplicateAlias(ref a) if a == "alice"));
        assert_eq!(vault.len().unwrap(), 1);
    }

    #[test]
    fn test_empty_alias() {
        let vault = vault();
        assert!(matches!(vault.create_key("   ", "pw"), Err(VaultError::InvalidAlias)));
    }

    #[test]
    fn test_concurrent_create_same_alias() {
        let vault = Arc::new(vault());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let vault = Arc::clone(&vault);
                thread::spawn(move || vault.create_key("shared", &format!("pw{i}")))
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, VaultError::DuplicateAlias(_))));
        assert_eq!(vault.len().unwrap(), 1);
    }

    #[test]
    fn test_concurrent_delete_and_reset_password() {
        for _ in 0..8 {
            let vault = Arc::new(vault());
            let key = vault.create_key("contested", "old").unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let deleter = {
                let (vault, barrier) = (Arc::clone(&vault), Arc::clone(&barrier));
                let xpub = key.xpub;
                thread::spawn(move || {
                    barrier.wait();
                    vault.delete_key(&xpub, "old")
                })
            };
            let resetter = {
                let (vault, barrier) = (Arc::clone(&vault), Arc::clone(&barrier));
                let xpub = key.xpub;
                thread::spawn(move || {
                    barrier.wait();
                    vault.reset_password(&xpub, "old", "new")
                })
            };
            let deleted = deleter.join().unwrap();
            let reset = resetter.join().unwrap();

            let root = DerivationPath::root();
            match (deleted, reset) {
                (Ok(()), Err(VaultError::NotFound(_))) => {
                    assert_eq!(vault.get_key(&key.xpub).unwrap(), None);
                    assert!(vault.is_empty().unwrap());
                }
                (Err(VaultError::Auth), Ok(())) => {
                    assert!(vault.sign(&key.xpub, &root, b"d", "new").is_ok());
                    assert!(matches!(
                        vault.sign(&key.xpub, &root, b"d", "old"),
                        Err(VaultError::Auth)
                    ));
                }
                other => panic!("inconsistent outcome: {other:?}"),
            }
            assert_eq!(vault.locks.len(), 0);
        }
    }

    #[test]
    fn test_write_locks_are_released() {
        let vault = vault();
        let a = vault.create_key("a", "pw").unwrap();
        let b = vault.create_key("b", "pw").unwrap();
        assert!(vault.create_key("a", "pw").is_err());
        assert_eq!(vault.locks.len(), 0);

        vault.reset_password(&a.xpub, "pw", "pw2").unwrap();
        assert!(vault.reset_password(&b.xpub, "wrong", "x").is_err());
        assert_eq!(vault.locks.len(), 0);

        vault.delete_key(&b.xpub, "pw").unwrap();
        assert_eq!(vault.locks.len(), 0);
    }

    #[test]
    fn test_sign_with_derived_key() {
        let vault = vault();
        let key = vault.create_key("alice", "pw").unwrap();
        let path = DerivationPath::from_indices(&[44, 0, 1]);
        let digest = hash(b"payload");

        let sig = vault.sign(&key.xpub, &path, digest.as_bytes(), "pw").unwrap();
        let child = key.xpub.derive(&path).unwrap();
        assert!(child.verify(digest.as_bytes(), &sig).is_ok());

        assert!(matches!(
            vault.sign(&key.xpub, &path, digest.as_bytes(), "nope"),
            Err(VaultError::Auth)
        ));
    }

    #[test]
    fn test_sign_unknown_key_is_no_key() {
        let vault = vault();
        let stranger = XPrv::generate().xpub();
        let err = vault
            .sign(&stranger, &DerivationPath::root(), b"digest", "pw")
            .unwrap_err();
        assert!(matches!(err, VaultError::NoKey(_)));
    }

    #[test]
    fn test_delete_requires_password() {
        let vault = vault();
        let key = vault.create_key("alice", "pw").unwrap();

        assert!(matches!(vault.delete_key(&key.xpub, "bad"), Err(VaultError::Auth)));
        assert!(vault.get_key(&key.xpub).unwrap().is_some());

        vault.delete_key(&key.xpub, "pw").unwrap();
        assert!(vault.get_key(&key.xpub).unwrap().is_none());
        assert!(matches!(
            vault.delete_key(&key.xpub, "pw"),
            Err(VaultError::NotFound(_))
        ));

        // The alias is free again and maps to a fresh key.
        let again = vault.create_key("alice", "pw").unwrap();
        assert_ne!(again.xpub, key.xpub);
        assert!(matches!(
            vault.sign(&key.xpub, &DerivationPath::root(), b"d", "pw"),
            Err(VaultError::NoKey(_))
        ));
    }

    #[test]
    fn test_reset_password() {
        let vault = vault();
        let key = vault.create_key("alice", "old").unwrap();

        assert!(matches!(
            vault.reset_password(&key.xpub, "wrong", "new"),
            Err(VaultError::Auth)
        ));
        vault.reset_password(&key.xpub, "old", "new").unwrap();

        let root = DerivationPath::root();
        assert!(matches!(
            vault.sign(&key.xpub, &root, b"d", "old"),
            Err(VaultError::Auth)
        ));
        let sig = vault.sign(&key.xpub, &root, b"d", "new").unwrap();
        assert!(key.xpub.verify(b"d", &sig).is_ok());

        let stranger = XPrv::generate().xpub();
        assert!(matches!(
            vault.reset_password(&stranger, "a", "b"),
            Err(VaultError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_pages() {
        let vault = vault();
        for alias in ["carol", "alice", "erin", "bob", "dave"] {
            vault.create_key(alias, "pw").unwrap();
        }

        let first = vault.list_keys("", 2).unwrap();
        let aliases: Vec<_> = first.items.iter().map(|k| k.alias.as_str()).collect();
        assert_eq!(aliases, ["alice", "bob"]);
        assert!(!first.last_page);

        let second = vault.list_keys(&first.next, 2).unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(!second.last_page);

        // Exactly one entry remains: the next page holds it and is the last.
        let third = vault.list_keys(&second.next, 2).unwrap();
        assert_eq!(third.items.len(), 1);
        assert_eq!(third.items[0].alias, "erin");
        assert!(third.last_page);

        let past_end = vault.list_keys(&third.next, 2).unwrap();
        assert!(past_end.items.is_empty());
        assert!(past_end.last_page);
        assert_eq!(past_end.next, third.next);
    }

    #[test]
    fn test_list_exact_fit_is_last_page() {
        let vault = vault();
        vault.create_key("a", "pw").unwrap();
        vault.create_key("b", "pw").unwrap();
        let page = vault.list_keys("", 2).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.last_page);
    }

    #[test]
    fn test_list_limits() {
        let vault = vault();
        assert!(matches!(
            vault.list_keys("", 11),
            Err(VaultError::TooManyRequested {
                requested: 11,
                max: 10,
            })
        ));
        assert!(vault.list_keys("", 10).is_ok());

        // 0 selects the default, which here exceeds the configured maximum.
        assert!(matches!(
            vault.list_keys("", 0),
            Err(VaultError::TooManyRequested { requested: 100, .. })
        ));

        let defaults = vault_with(test_config());
        defaults.create_key("only", "pw").unwrap();
        let page = defaults.list_keys("", 0).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.last_page);
    }

    #[test]
    fn test_list_bad_cursor() {
        let vault = vault();
        assert!(matches!(
            vault.list_keys("not hex", 5),
            Err(VaultError::InvalidCursor(_))
        ));
        assert!(matches!(
            vault.list_keys("ff", 5),
            Err(VaultError::InvalidCursor(_))
        ));
    }
}
